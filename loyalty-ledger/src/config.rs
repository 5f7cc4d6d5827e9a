//! Configuration for the loyalty ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default issuer organization (MSP) allowed to issue points
pub const DEFAULT_ISSUER_MSP: &str = "BankOrgMSP";

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Organization whose members may issue points
    pub issuer_msp: String,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,

    /// Event log configuration
    pub events: EventLogConfig,

    /// Actor configuration
    pub actor: ActorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/loyalty"),
            service_name: "loyalty-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            issuer_msp: DEFAULT_ISSUER_MSP.to_string(),
            rocksdb: RocksDbConfig::default(),
            events: EventLogConfig::default(),
            actor: ActorConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Target file size (MB)
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            target_file_size_mb: 64,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Transition event log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogConfig {
    /// Broadcast channel capacity (unconsumed records per subscriber)
    pub capacity: usize,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// Submission actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Mailbox capacity (pending operations before backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1024,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("LOYALTY_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(issuer) = std::env::var("LOYALTY_ISSUER_MSP") {
            config.issuer_msp = issuer;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "loyalty-ledger");
        assert_eq!(config.issuer_msp, "BankOrgMSP");
        assert_eq!(config.events.capacity, 1024);
    }

    #[test]
    fn test_from_toml() {
        let toml = r#"
            data_dir = "/tmp/ledger"
            service_name = "loyalty-ledger"
            service_version = "0.1.0"
            issuer_msp = "CentralBankMSP"

            [rocksdb]
            write_buffer_size_mb = 16
            max_write_buffer_number = 2
            target_file_size_mb = 16
            max_background_jobs = 1
            enable_statistics = false

            [events]
            capacity = 32

            [actor]
            mailbox_capacity = 64
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.issuer_msp, "CentralBankMSP");
        assert_eq!(config.rocksdb.write_buffer_size_mb, 16);
        assert_eq!(config.actor.mailbox_capacity, 64);
    }
}
