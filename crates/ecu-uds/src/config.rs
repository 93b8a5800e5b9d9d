//! Transfer configuration
//!
//! Block counter behaviour and chunk limits for TransferData (0x36).

use serde::{Deserialize, Serialize};

/// Transfer data configuration for UDS 0x36
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Block counter value expected for the first chunk of a download
    #[serde(
        default = "default_block_counter_start",
        deserialize_with = "deserialize_hex_u8"
    )]
    pub block_counter_start: u8,

    /// Block counter value that follows 0xFF
    #[serde(
        default = "default_block_counter_wrap",
        deserialize_with = "deserialize_hex_u8"
    )]
    pub block_counter_wrap: u8,

    /// Upper bound for the chunk size a download may negotiate
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
}

fn default_block_counter_start() -> u8 {
    1
}

fn default_block_counter_wrap() -> u8 {
    0
}

fn default_max_chunk_size() -> usize {
    4094
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            block_counter_start: default_block_counter_start(),
            block_counter_wrap: default_block_counter_wrap(),
            max_chunk_size: default_max_chunk_size(),
        }
    }
}

impl TransferConfig {
    /// Block counter that follows `current`
    pub fn next_block(&self, current: u8) -> u8 {
        match current.checked_add(1) {
            Some(next) => next,
            None => self.block_counter_wrap,
        }
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

macro_rules! hex_or_int_deserializer {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name<'de, D>(deserializer: D) -> Result<$ty, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            use serde::de::Error;

            #[derive(Deserialize)]
            #[serde(untagged)]
            enum HexOrInt {
                Hex(String),
                Int($ty),
            }

            match HexOrInt::deserialize(deserializer)? {
                HexOrInt::Int(n) => Ok(n),
                HexOrInt::Hex(s) => <$ty>::from_str_radix(strip_hex_prefix(&s), 16)
                    .map_err(|e| D::Error::custom(e.to_string())),
            }
        }
    };
}

hex_or_int_deserializer!(
    /// Deserialize a hex u8 (supports "0x09" or 9)
    deserialize_hex_u8,
    u8
);

hex_or_int_deserializer!(
    /// Deserialize a hex u32 (supports "0x08000000" or 134217728)
    deserialize_hex_u32,
    u32
);
