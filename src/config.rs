//! Daemon configuration.
//!
//! The configuration is read once from a JSON file at startup and then shared
//! read-only with every component that needs it. Every field has a default,
//! so `{}` is a complete configuration.
//!
//! ```json
//! {
//!   "daemon_type": "grpc",
//!   "daemon_end_point": "127.0.0.1:8080",
//!   "blockchain_enabled": true,
//!   "ethereum_json_rpc_endpoint": "http://127.0.0.1:8545",
//!   "escrow_contract_address": "0x5e592F9b1d303183d963635f895f0f0C48284f4e",
//!   "average_block_time": 12000,
//!   "pricing": { "type": "fixed_price", "price": 10, "method_prices": { "/svc/train": 500 } },
//!   "payment_channel_storage_client": { "request_timeout": 3000 },
//!   "channels": [{
//!     "channel_id": "0x1f91…",
//!     "sender": "0x…",
//!     "recipient": "0x…",
//!     "full_amount": 1000,
//!     "expiration": 1893456000
//!   }]
//! }
//! ```
//!
//! `channels` seeds the channel store at startup, with ids and addresses in
//! 0x-prefixed hex. With the blockchain disabled it is the only source of
//! channels the daemon accepts payments on.

use crate::types::PaymentChannel;
use ethers::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonType {
    #[default]
    Grpc,
    Http,
}

#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon_type: DaemonType,
    #[serde(default = "defaults::daemon_end_point")]
    pub daemon_end_point: String,
    #[serde(default)]
    pub blockchain_enabled: bool,
    #[serde(default = "defaults::ethereum_json_rpc_endpoint")]
    pub ethereum_json_rpc_endpoint: String,
    #[serde(default)]
    pub escrow_contract_address: Option<Address>,
    #[serde(default)]
    pub ssl_cert: Option<PathBuf>,
    #[serde(default)]
    pub ssl_key: Option<PathBuf>,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub payment_channel_storage_client: StorageClientConfig,
    /// Bound on a single chain oracle read, in milliseconds.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "defaults::oracle_timeout")]
    pub oracle_timeout: Duration,
    /// Used to turn block-number expirations into unix time, in milliseconds.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "defaults::average_block_time")]
    pub average_block_time: Duration,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub channels: Vec<ChannelSeed>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

/// Bound on a single channel store call, in milliseconds.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageClientConfig {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "defaults::request_timeout")]
    pub request_timeout: Duration,
}

/// A channel the daemon starts out knowing, with nothing authorized yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSeed {
    pub channel_id: H256,
    pub sender: Address,
    pub recipient: Address,
    pub full_amount: u64,
    /// Unix seconds.
    pub expiration: u64,
}

impl From<&ChannelSeed> for PaymentChannel {
    fn from(seed: &ChannelSeed) -> Self {
        PaymentChannel {
            channel_id: seed.channel_id,
            sender: seed.sender,
            recipient: seed.recipient,
            full_amount: U256::from(seed.full_amount),
            authorized_amount: U256::zero(),
            nonce: U256::zero(),
            expiration: U256::from(seed.expiration),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PricingConfig {
    /// `price` applies to every method not listed in `method_prices`.
    FixedPrice {
        #[serde(default)]
        price: Option<u64>,
        #[serde(default)]
        method_prices: HashMap<String, u64>,
    },
    Invoice,
}

mod defaults {
    use std::time::Duration;

    pub fn daemon_end_point() -> String {
        "127.0.0.1:8080".to_string()
    }

    pub fn ethereum_json_rpc_endpoint() -> String {
        "http://127.0.0.1:8545".to_string()
    }

    pub fn log_level() -> String {
        "info".to_string()
    }

    pub fn request_timeout() -> Duration {
        Duration::from_secs(3)
    }

    pub fn oracle_timeout() -> Duration {
        Duration::from_secs(5)
    }

    pub fn average_block_time() -> Duration {
        Duration::from_secs(12)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

impl Default for StorageClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: defaults::request_timeout(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig::FixedPrice {
            price: Some(1),
            method_prices: HashMap::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_type: DaemonType::default(),
            daemon_end_point: defaults::daemon_end_point(),
            blockchain_enabled: false,
            ethereum_json_rpc_endpoint: defaults::ethereum_json_rpc_endpoint(),
            escrow_contract_address: None,
            ssl_cert: None,
            ssl_key: None,
            log: LogConfig::default(),
            payment_channel_storage_client: StorageClientConfig::default(),
            oracle_timeout: defaults::oracle_timeout(),
            average_block_time: defaults::average_block_time(),
            pricing: PricingConfig::default(),
            channels: Vec::new(),
        }
    }
}

impl Config {
    /// Parses and validates a JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration file at `path`, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssl_cert.is_some() != self.ssl_key.is_some() {
            return Err(ConfigError::Invalid(
                "SSL requires both key and certificate when enabled".to_string(),
            ));
        }
        if self.blockchain_enabled && self.escrow_contract_address.is_none() {
            return Err(ConfigError::Invalid(
                "blockchain_enabled requires escrow_contract_address".to_string(),
            ));
        }
        if self.payment_channel_storage_client.request_timeout.is_zero()
            || self.oracle_timeout.is_zero()
        {
            return Err(ConfigError::Invalid("timeouts must be non-zero".to_string()));
        }
        if self.average_block_time.as_secs() == 0 {
            return Err(ConfigError::Invalid(
                "average_block_time must be at least one second".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for seed in &self.channels {
            if !seen.insert(seed.channel_id) {
                return Err(ConfigError::Invalid(format!(
                    "channel {:?} is listed twice",
                    seed.channel_id
                )));
            }
        }
        Ok(())
    }

    /// Logs the final configuration, one field per line.
    pub fn log_config(&self) {
        tracing::info!("Final configuration:");
        tracing::info!("daemon_type: {:?}", self.daemon_type);
        tracing::info!("daemon_end_point: {}", self.daemon_end_point);
        tracing::info!("blockchain_enabled: {}", self.blockchain_enabled);
        tracing::info!("ethereum_json_rpc_endpoint: {}", self.ethereum_json_rpc_endpoint);
        tracing::info!("escrow_contract_address: {:?}", self.escrow_contract_address);
        tracing::info!("ssl_cert: {:?}", self.ssl_cert);
        tracing::info!("ssl_key: {:?}", self.ssl_key);
        tracing::info!("log.level: {}", self.log.level);
        tracing::info!(
            "payment_channel_storage_client: {:?}",
            self.payment_channel_storage_client
        );
        tracing::info!("oracle_timeout: {:?}", self.oracle_timeout);
        tracing::info!("average_block_time: {:?}", self.average_block_time);
        tracing::info!("pricing: {:?}", self.pricing);
        tracing::info!("channels: {} seeded", self.channels.len());
    }
}
