//! Data identifier (DID) store
//!
//! A persisted map from 16-bit DIDs to byte values. Services read and write
//! status flags through the [`DidStore`] trait so the file-backed store can
//! be swapped for [`MemoryDidStore`] in tests.

mod file;
mod memory;

pub use file::FileDidStore;
pub use memory::MemoryDidStore;

use thiserror::Error;

/// 16-bit data identifier
pub type Did = u16;

/// Errors from a DID store backend
#[derive(Debug, Error)]
pub enum DidStoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed entry on line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// Key-value access to DIDs
///
/// Last write wins. Implementations use interior mutability so one store can
/// be shared between services.
pub trait DidStore: Send + Sync {
    /// Read a DID value, `None` when the DID has never been written
    fn get(&self, did: Did) -> Result<Option<Vec<u8>>, DidStoreError>;

    /// Write a DID value, replacing any previous one
    fn set(&self, did: Did, value: &[u8]) -> Result<(), DidStoreError>;
}
