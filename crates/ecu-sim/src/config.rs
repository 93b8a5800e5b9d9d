//! Simulator configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.

use std::path::PathBuf;

use ecu_uds::config::{deserialize_hex_u32, deserialize_hex_u8};
use ecu_uds::TransferConfig;
use serde::{Deserialize, Serialize};

/// Complete simulator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Simulated ECU
    #[serde(default)]
    pub ecu: EcuSection,

    /// Tester driving the transfer
    #[serde(default)]
    pub tester: TesterSection,

    /// Transfer parameters
    #[serde(default)]
    pub transfer: TransferSection,

    /// DID store backing
    #[serde(default)]
    pub store: StoreSection,
}

impl SimConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

// =============================================================================
// ECU / Tester
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcuSection {
    /// ECU identifier, matched against the firmware image target
    #[serde(default = "default_ecu_id")]
    pub id: String,

    /// 8-bit bus address
    #[serde(default = "default_ecu_address", deserialize_with = "deserialize_hex_u8")]
    pub address: u8,
}

fn default_ecu_id() -> String {
    "battery_ecu".to_string()
}

fn default_ecu_address() -> u8 {
    0x11
}

impl Default for EcuSection {
    fn default() -> Self {
        Self {
            id: default_ecu_id(),
            address: default_ecu_address(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TesterSection {
    /// 8-bit bus address
    #[serde(
        default = "default_tester_address",
        deserialize_with = "deserialize_hex_u8"
    )]
    pub address: u8,

    /// How long to wait for each response
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Resends of a block answered with GeneralProgrammingFailure
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_tester_address() -> u8 {
    0xFA
}

fn default_response_timeout_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    3
}

impl Default for TesterSection {
    fn default() -> Self {
        Self {
            address: default_tester_address(),
            response_timeout_ms: default_response_timeout_ms(),
            max_retries: default_max_retries(),
        }
    }
}

// =============================================================================
// Transfer
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSection {
    /// Block counter and chunk limits
    #[serde(flatten)]
    pub counters: TransferConfig,

    /// Payload bytes per TransferData request
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Start address of the download region
    #[serde(
        default = "default_memory_address",
        deserialize_with = "deserialize_hex_u32"
    )]
    pub memory_address: u32,

    /// Size of the simulated flash
    #[serde(default = "default_memory_size")]
    pub memory_size: usize,
}

fn default_chunk_size() -> usize {
    64
}

fn default_memory_address() -> u32 {
    0x0800_0000
}

fn default_memory_size() -> usize {
    256 * 1024
}

impl Default for TransferSection {
    fn default() -> Self {
        Self {
            counters: TransferConfig::default(),
            chunk_size: default_chunk_size(),
            memory_address: default_memory_address(),
            memory_size: default_memory_size(),
        }
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSection {
    /// DID file; the store is kept in memory when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: SimConfig = toml::from_str("").unwrap();
        assert_eq!(config.ecu.address, 0x11);
        assert_eq!(config.tester.address, 0xFA);
        assert_eq!(config.transfer.chunk_size, 64);
        assert_eq!(config.transfer.counters.block_counter_start, 1);
        assert!(config.store.path.is_none());
    }

    #[test]
    fn hex_and_integer_addresses() {
        let toml = r#"
[ecu]
id = "hvac"
address = "0x22"

[tester]
address = 250

[transfer]
chunk_size = 128
memory_address = "0x08010000"
block_counter_start = "0x00"
block_counter_wrap = 1
"#;
        let config: SimConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.ecu.id, "hvac");
        assert_eq!(config.ecu.address, 0x22);
        assert_eq!(config.tester.address, 0xFA);
        assert_eq!(config.transfer.chunk_size, 128);
        assert_eq!(config.transfer.memory_address, 0x0801_0000);
        assert_eq!(config.transfer.counters.block_counter_start, 0);
        assert_eq!(config.transfer.counters.block_counter_wrap, 1);
    }

    #[test]
    fn store_path_is_optional() {
        let config: SimConfig = toml::from_str("[store]\npath = \"dids.txt\"\n").unwrap();
        assert_eq!(config.store.path, Some(PathBuf::from("dids.txt")));
    }
}
