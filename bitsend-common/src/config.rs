//! Configuration management for BitSend.
//!
//! Settings are stored in TOML. Every section has defaults, so an empty file (or
//! no file at all) yields a working testnet configuration.
//!
//! ```toml
//! [network]
//! network = "testnet"
//! timeout_seconds = 30
//!
//! [fees]
//! default_fee_rate = "10"
//! max_fee_rate = "1000"
//!
//! [history]
//! page_ceiling = 1000
//! ```
//!
//! ## Security Considerations
//!
//! - No secret material belongs in this configuration; WIF keys are passed per call
//! - All values must be validated with [`Config::validate`] before use

use crate::error::TransferResult;
use crate::history::DEFAULT_PAGE_CEILING;
use crate::logging::LogConfig;
use crate::types::{parse_network, FeeRate, DEFAULT_FEE_RATE_SAT_VB};
use anyhow::{anyhow, Context, Result};
use bitcoin::Network;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration structure for BitSend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub fees: FeeConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

/// Network and data source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// mainnet, testnet, signet or regtest
    #[serde(default = "default_network")]
    pub network: String,

    /// Esplora base URL; the public endpoint for the network when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub esplora_url: Option<String>,

    /// HTTP timeout for every request
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            esplora_url: None,
            timeout_seconds: default_timeout(),
        }
    }
}

impl NetworkConfig {
    /// The configured network as a `bitcoin::Network`
    pub fn bitcoin_network(&self) -> Result<Network> {
        parse_network(&self.network).map_err(|e| anyhow!("{}", e))
    }

    /// Esplora endpoint to use, falling back to a public one for the network
    pub fn esplora_base_url(&self) -> Result<String> {
        if let Some(url) = &self.esplora_url {
            return Ok(url.trim_end_matches('/').to_string());
        }
        Ok(default_esplora_url(self.bitcoin_network()?).to_string())
    }
}

/// Public Esplora endpoint for `network`
pub fn default_esplora_url(network: Network) -> &'static str {
    match network {
        Network::Bitcoin => "https://blockstream.info/api",
        Network::Signet => "https://mempool.space/signet/api",
        Network::Regtest => "http://localhost:3002",
        _ => "https://blockstream.info/testnet/api",
    }
}

/// Fee rate configuration, in sat/vB
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    #[serde(default = "default_fee_rate")]
    pub default_fee_rate: Decimal,

    /// Requests above this rate are rejected as invalid input
    #[serde(default = "default_max_fee_rate")]
    pub max_fee_rate: Decimal,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            default_fee_rate: default_fee_rate(),
            max_fee_rate: default_max_fee_rate(),
        }
    }
}

impl FeeConfig {
    pub fn default_rate(&self) -> TransferResult<FeeRate> {
        FeeRate::from_sat_per_vb(self.default_fee_rate)
    }

    pub fn max_rate(&self) -> TransferResult<FeeRate> {
        FeeRate::from_sat_per_vb(self.max_fee_rate)
    }
}

/// History paging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum number of confirmed pages fetched per listing
    #[serde(default = "default_page_ceiling")]
    pub page_ceiling: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_ceiling: default_page_ceiling(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| anyhow!("Failed to parse config file: {}", e))
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.network
            .bitcoin_network()
            .context("Invalid network type")?;

        if self.network.timeout_seconds == 0 {
            return Err(anyhow!("Invalid network timeout: must be greater than 0"));
        }

        if let Some(url) = &self.network.esplora_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("Invalid Esplora URL: {}", url);
            }
        }

        let default_rate = self
            .fees
            .default_rate()
            .map_err(|e| anyhow!("Invalid default fee rate: {}", e))?;
        let max_rate = self
            .fees
            .max_rate()
            .map_err(|e| anyhow!("Invalid maximum fee rate: {}", e))?;
        if default_rate > max_rate {
            anyhow::bail!(
                "Default fee rate {} exceeds maximum {}",
                default_rate,
                max_rate
            );
        }

        if self.history.page_ceiling == 0 {
            return Err(anyhow!("Invalid page ceiling: must be greater than 0"));
        }

        Ok(())
    }
}

/// Ensure a configuration file exists at the specified path
/// If it doesn't exist, create it with default values
pub fn ensure_config_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }
        Config::default().save(path)?;
    }

    Ok(())
}

// Default value functions

fn default_network() -> String {
    "testnet".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_fee_rate() -> Decimal {
    Decimal::from(DEFAULT_FEE_RATE_SAT_VB)
}

fn default_max_fee_rate() -> Decimal {
    Decimal::from(1_000u64)
}

fn default_page_ceiling() -> usize {
    DEFAULT_PAGE_CEILING
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_testnet_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.network.bitcoin_network().unwrap(), Network::Testnet);
        assert_eq!(
            config.network.esplora_base_url().unwrap(),
            "https://blockstream.info/testnet/api"
        );
        assert_eq!(config.history.page_ceiling, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn explicit_url_wins() {
        let config = Config::from_toml_str(
            "[network]\nnetwork = \"mainnet\"\nesplora_url = \"https://mempool.space/api/\"\n",
        )
        .unwrap();
        assert_eq!(config.network.esplora_base_url().unwrap(), "https://mempool.space/api");
    }

    #[test]
    fn rejects_default_rate_above_maximum() {
        let mut config = Config::default();
        config.fees.default_fee_rate = Decimal::from(2_000u64);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_network() {
        let config = Config::from_toml_str("[network]\nnetwork = \"liquid\"\n").unwrap();
        assert!(config.validate().is_err());
    }
}
