use bitsend_common::logging::{
    self, sanitize_for_logging, write_to_log_file, EventLogger, LogConfig, LogContext, LogForwarder,
    LogLevel, MemoryLogger,
};
use serde_json::json;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_init_writes_json_lines_to_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bitsend.log");
    let config = LogConfig {
        level: LogLevel::Debug,
        log_file: Some(path.to_string_lossy().into_owned()),
        json_format: true,
        ..LogConfig::default()
    };

    logging::init(&config).unwrap();
    // Only the first call configures the backend
    assert!(logging::init(&LogConfig::default()).is_ok());

    LogForwarder.info(
        LogContext::Transaction,
        "transaction broadcast",
        Some(json!({ "txid": "7967a5185e907a25225574544c31f7b059c1a191d65b53dcc1554d339c4f9efc" })),
    );
    log::logger().flush();

    let content = fs::read_to_string(&path).unwrap();
    let line = content
        .lines()
        .find(|l| l.contains("transaction broadcast"))
        .unwrap();
    let record: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(record["level"], "INFO");
    assert_eq!(record["target"], "bitsend::transaction");
    assert!(record["message"].as_str().unwrap().contains("7967...9efc"));
}

#[test]
fn test_memory_logger_sanitizes_params() {
    let logger = MemoryLogger::new();
    logger.debug(
        LogContext::Network,
        "fetched spendable outputs",
        Some(json!({ "sender": "tb1qa220d63y98uykm8qz4fa3w7fwsarg0ncwxzghh", "count": 2 })),
    );

    let records = logger.records();
    assert_eq!(records.len(), 1);
    let params = records[0].params.as_ref().unwrap();
    assert_eq!(params["sender"], "tb1q...zghh");
    assert_eq!(params["count"], 2);
}

#[test]
fn test_direct_log_file_append() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("audit.log");
    write_to_log_file(&path, "first").unwrap();
    write_to_log_file(&path, "second").unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert!(content.ends_with("second\n"));
    assert_eq!(sanitize_for_logging("abc"), "*****");
}
