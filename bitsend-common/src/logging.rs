//! Security-aware logging infrastructure for BitSend
//!
//! Two layers:
//! - [`init`] configures the process-wide `log` backend (env_logger) once, for
//!   callers that want console or file output.
//! - [`EventLogger`] is the collaborator every pipeline component receives. The
//!   pipeline never reaches for a global logger directly, so tests can inject a
//!   [`MemoryLogger`] and assert on what was recorded.
//!
//! # Security Considerations
//!
//! - NEVER log WIF secrets or private keys
//! - Addresses, txids and raw transaction hex are truncated by [`sanitize_for_logging`]
//!
//! # Usage
//!
//! ```
//! use bitsend_common::logging::{self, EventLogger, LogConfig, LogContext, LogForwarder};
//! use serde_json::json;
//!
//! logging::init(&LogConfig::default()).expect("Failed to initialize logging");
//!
//! let logger = LogForwarder;
//! logger.info(LogContext::Network, "fetched utxos", Some(json!({ "count": 3 })));
//! ```

use chrono::Local;
use log::{debug, LevelFilter};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write as IoWrite;
use std::sync::{Mutex, Once};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Error conditions
    Error,
    /// Warning conditions
    Warn,
    /// Informational messages
    Info,
    /// Debug-level messages
    Debug,
    /// Trace level (very verbose)
    Trace,
}

/// Log context categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogContext {
    /// Key parsing, address derivation, signing
    Security,
    /// Selection, estimation and change decisions
    Core,
    /// Data source requests
    Network,
    /// Transaction assembly and broadcast
    Transaction,
}

impl LogContext {
    fn target(&self) -> &'static str {
        match self {
            LogContext::Security => "bitsend::security",
            LogContext::Core => "bitsend::core",
            LogContext::Network => "bitsend::network",
            LogContext::Transaction => "bitsend::transaction",
        }
    }
}

/// Configuration for the logging system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default log level for all contexts
    pub level: LogLevel,
    /// Path to log file (None for console-only)
    pub log_file: Option<String>,
    /// Whether to include timestamps in log messages
    pub include_timestamps: bool,
    /// Whether to include source location in log messages
    pub include_source_location: bool,
    /// Whether to log to console
    pub console_logging: bool,
    /// Whether to use JSON format for logs (machine-readable)
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            log_file: None,
            include_timestamps: true,
            include_source_location: false,
            console_logging: true,
            json_format: false,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

// Ensure logging is only initialized once
static LOGGING_INIT: Once = Once::new();

/// Initialize the logging backend with the given configuration
///
/// Safe to call multiple times; only the first call configures the backend.
/// Returns an error when the configured log file cannot be opened.
pub fn init(config: &LogConfig) -> Result<(), String> {
    let mut result = Ok(());

    let include_timestamps = config.include_timestamps;
    let include_source_location = config.include_source_location;
    let json_format = config.json_format;
    let log_file = config.log_file.clone();
    let console_logging = config.console_logging;
    let level = config.level;

    LOGGING_INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        builder.filter_level(if console_logging || log_file.is_some() {
            level.into()
        } else {
            LevelFilter::Off
        });

        builder.format(move |buf, record| {
            let timestamp = if include_timestamps {
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
            } else {
                String::new()
            };

            let source_location = if include_source_location {
                format!(" [{}:{}]", record.file().unwrap_or("unknown"), record.line().unwrap_or(0))
            } else {
                String::new()
            };

            if json_format {
                let line = json!({
                    "timestamp": timestamp,
                    "level": record.level().to_string(),
                    "target": record.target(),
                    "location": source_location,
                    "message": record.args().to_string(),
                });
                writeln!(buf, "{}", line)
            } else {
                if include_timestamps {
                    write!(buf, "[{}] ", timestamp)?;
                }
                writeln!(
                    buf,
                    "[{}]{} {}: {}",
                    record.level(),
                    source_location,
                    record.target(),
                    record.args()
                )
            }
        });

        if let Some(file_path) = &log_file {
            match OpenOptions::new().create(true).append(true).open(file_path) {
                Ok(file) => {
                    builder.target(env_logger::Target::Pipe(Box::new(file)));
                }
                Err(e) => {
                    result = Err(format!("Failed to open log file {}: {}", file_path, e));
                    return;
                }
            }
        }

        if let Err(e) = builder.try_init() {
            // Tests and embedding applications often install their own logger first
            debug!("Logger already initialized, using existing instance: {}", e);
        }
    });

    result
}

/// Sanitize a potentially sensitive string for logging
///
/// Keeps the first and last four characters of long values.
pub fn sanitize_for_logging(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = input.chars().collect();
    if chars.len() <= 8 {
        return "*****".to_string();
    }

    let first: String = chars[..4].iter().collect();
    let last: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", first, last)
}

/// Parameter keys whose values are truncated before they reach a log sink
const SANITIZED_KEYS: &[&str] = &["address", "sender", "recipient", "txid", "raw_tx", "cursor"];

/// Truncate identifying values inside structured log parameters
pub fn sanitize_params(params: serde_json::Value) -> serde_json::Value {
    match params {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let v = match (&v, SANITIZED_KEYS.contains(&k.as_str())) {
                        (serde_json::Value::String(s), true) => json!(sanitize_for_logging(s)),
                        _ => v,
                    };
                    (k, v)
                })
                .collect(),
        ),
        other => other,
    }
}

/// Observability collaborator injected into every pipeline component
pub trait EventLogger {
    /// Record one event
    fn log(
        &self,
        level: LogLevel,
        context: LogContext,
        message: &str,
        params: Option<serde_json::Value>,
    );

    fn error(&self, context: LogContext, message: &str, params: Option<serde_json::Value>) {
        self.log(LogLevel::Error, context, message, params);
    }

    fn warn(&self, context: LogContext, message: &str, params: Option<serde_json::Value>) {
        self.log(LogLevel::Warn, context, message, params);
    }

    fn info(&self, context: LogContext, message: &str, params: Option<serde_json::Value>) {
        self.log(LogLevel::Info, context, message, params);
    }

    fn debug(&self, context: LogContext, message: &str, params: Option<serde_json::Value>) {
        self.log(LogLevel::Debug, context, message, params);
    }
}

/// Forwards events to the `log` facade, one target per [`LogContext`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LogForwarder;

impl EventLogger for LogForwarder {
    fn log(
        &self,
        level: LogLevel,
        context: LogContext,
        message: &str,
        params: Option<serde_json::Value>,
    ) {
        let lvl: log::Level = level.into();
        match params.map(sanitize_params) {
            Some(p) => log::log!(target: context.target(), lvl, "{} {}", message, p),
            None => log::log!(target: context.target(), lvl, "{}", message),
        }
    }
}

/// One recorded event
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub context: LogContext,
    pub message: String,
    pub params: Option<serde_json::Value>,
}

/// Keeps every event in memory; useful for asserting on pipeline decisions
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Whether any recorded message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.records().iter().any(|r| r.message.contains(needle))
    }

    /// Number of events at the given level
    pub fn count_at(&self, level: LogLevel) -> usize {
        self.records().iter().filter(|r| r.level == level).count()
    }
}

impl EventLogger for MemoryLogger {
    fn log(
        &self,
        level: LogLevel,
        context: LogContext,
        message: &str,
        params: Option<serde_json::Value>,
    ) {
        if let Ok(mut records) = self.records.lock() {
            records.push(LogRecord {
                level,
                context,
                message: message.to_string(),
                params: params.map(sanitize_params),
            });
        }
    }
}

/// Write to a log file directly (for cases where the logger isn't appropriate)
pub fn write_to_log_file(log_path: &std::path::Path, message: &str) -> Result<(), String> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .map_err(|e| e.to_string())?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    let log_line = format!("[{}] {}\n", timestamp, message);

    file.write_all(log_line.as_bytes()).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_long_identifiers() {
        assert_eq!(
            sanitize_for_logging("tb1qa220d63y98uykm8qz4fa3w7fwsarg0ncwxzghh"),
            "tb1q...zghh"
        );
        assert_eq!(sanitize_for_logging("short"), "*****");
        assert_eq!(sanitize_for_logging(""), "");
    }

    #[test]
    fn only_identifying_params_are_truncated() {
        let params = sanitize_params(json!({
            "address": "tb1qa220d63y98uykm8qz4fa3w7fwsarg0ncwxzghh",
            "amount": 600,
        }));
        assert_eq!(params["address"], "tb1q...zghh");
        assert_eq!(params["amount"], 600);
    }

    #[test]
    fn memory_logger_records_levels() {
        let logger = MemoryLogger::new();
        logger.info(LogContext::Core, "selected 2 inputs", None);
        logger.warn(LogContext::Core, "change burned into fee", None);
        assert_eq!(logger.count_at(LogLevel::Warn), 1);
        assert!(logger.contains("selected"));
    }
}
