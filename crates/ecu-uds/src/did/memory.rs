//! In-memory DID store

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{Did, DidStore, DidStoreError};

/// Volatile DID store, mainly for tests
#[derive(Debug, Default)]
pub struct MemoryDidStore {
    values: RwLock<HashMap<Did, Vec<u8>>>,
}

impl MemoryDidStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-filled with `entries`
    pub fn with_entries(entries: impl IntoIterator<Item = (Did, Vec<u8>)>) -> Self {
        Self {
            values: RwLock::new(entries.into_iter().collect()),
        }
    }
}

impl DidStore for MemoryDidStore {
    fn get(&self, did: Did) -> Result<Option<Vec<u8>>, DidStoreError> {
        Ok(self.values.read().get(&did).cloned())
    }

    fn set(&self, did: Did, value: &[u8]) -> Result<(), DidStoreError> {
        self.values.write().insert(did, value.to_vec());
        Ok(())
    }
}
