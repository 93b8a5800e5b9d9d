//! Firmware image container
//!
//! The tester transfers one of these as the OTA payload and the ECU checks it
//! once RequestTransferExit succeeds. Fields are length-prefixed so trailing
//! erased flash after the image is ignored.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  Magic "OTAIMG" (6)                  │
//! │  Format revision (1)                 │
//! │  Version length (1) + version        │
//! │  Target length (1) + target ECU id   │
//! │  Payload length (4, big-endian)      │
//! │  Payload                             │
//! │  SHA-256 of everything above (32)    │
//! └──────────────────────────────────────┘
//! ```

use sha2::{Digest, Sha256};
use thiserror::Error;

pub const IMAGE_MAGIC: &[u8; 6] = b"OTAIMG";
pub const FORMAT_REVISION: u8 = 1;
const DIGEST_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FirmwareError {
    #[error("Image truncated while reading {field}")]
    Truncated { field: &'static str },

    #[error("Invalid image magic")]
    BadMagic,

    #[error("Unsupported format revision {0}")]
    UnsupportedRevision(u8),

    #[error("{field} longer than 255 bytes")]
    FieldTooLong { field: &'static str },

    #[error("Invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("Digest mismatch: expected {expected}, got {got}")]
    DigestMismatch { expected: String, got: String },

    #[error("Image targets '{got}', this ECU is '{expected}'")]
    TargetMismatch { expected: String, got: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    pub version: String,
    pub target_ecu: String,
    pub payload: Vec<u8>,
}

impl FirmwareImage {
    pub fn new(target_ecu: impl Into<String>, version: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            version: version.into(),
            target_ecu: target_ecu.into(),
            payload,
        }
    }

    /// Serialize, appending the SHA-256 digest
    pub fn to_bytes(&self) -> Result<Vec<u8>, FirmwareError> {
        let version = short_field(self.version.as_bytes(), "version")?;
        let target = short_field(self.target_ecu.as_bytes(), "target_ecu")?;

        let mut buf = Vec::with_capacity(
            IMAGE_MAGIC.len() + 3 + version.len() + target.len() + 4 + self.payload.len()
                + DIGEST_LEN,
        );
        buf.extend_from_slice(IMAGE_MAGIC);
        buf.push(FORMAT_REVISION);
        buf.push(version.len() as u8);
        buf.extend_from_slice(version);
        buf.push(target.len() as u8);
        buf.extend_from_slice(target);
        buf.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.payload);

        let digest = Sha256::digest(&buf);
        buf.extend_from_slice(&digest);
        Ok(buf)
    }

    /// Parse an image and check its digest
    ///
    /// Bytes after the digest are ignored.
    pub fn parse(data: &[u8]) -> Result<Self, FirmwareError> {
        let mut reader = Reader { data, pos: 0 };

        if reader.take(IMAGE_MAGIC.len(), "magic")? != IMAGE_MAGIC {
            return Err(FirmwareError::BadMagic);
        }
        let revision = reader.byte("revision")?;
        if revision != FORMAT_REVISION {
            return Err(FirmwareError::UnsupportedRevision(revision));
        }

        let version = reader.string("version")?;
        let target_ecu = reader.string("target_ecu")?;

        let len_bytes = reader.take(4, "payload length")?;
        let payload_len =
            u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
        let payload = reader.take(payload_len, "payload")?.to_vec();

        let signed_len = reader.pos;
        let expected = reader.take(DIGEST_LEN, "digest")?;
        let actual = Sha256::digest(&data[..signed_len]);
        if actual.as_slice() != expected {
            return Err(FirmwareError::DigestMismatch {
                expected: hex::encode(expected),
                got: hex::encode(actual),
            });
        }

        Ok(Self {
            version,
            target_ecu,
            payload,
        })
    }

    /// An empty target accepts any ECU
    pub fn check_target(&self, ecu_id: &str) -> Result<(), FirmwareError> {
        if !self.target_ecu.is_empty() && self.target_ecu != ecu_id {
            return Err(FirmwareError::TargetMismatch {
                expected: ecu_id.to_string(),
                got: self.target_ecu.clone(),
            });
        }
        Ok(())
    }
}

fn short_field<'a>(bytes: &'a [u8], field: &'static str) -> Result<&'a [u8], FirmwareError> {
    if bytes.len() > u8::MAX as usize {
        return Err(FirmwareError::FieldTooLong { field });
    }
    Ok(bytes)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], FirmwareError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(FirmwareError::Truncated { field })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self, field: &'static str) -> Result<u8, FirmwareError> {
        Ok(self.take(1, field)?[0])
    }

    fn string(&mut self, field: &'static str) -> Result<String, FirmwareError> {
        let len = self.byte(field)? as usize;
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| FirmwareError::InvalidUtf8 { field })
    }
}
