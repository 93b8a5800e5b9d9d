//! File-backed DID store
//!
//! One entry per line: a 4-digit hex DID followed by the value as
//! space-separated hex bytes, e.g. `01E0 21`. The file is the only copy of
//! the data: every `get` reads it and every `set` rewrites it, so values
//! written by another process or store instance are seen immediately.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use super::{Did, DidStore, DidStoreError};

/// DID store persisted to a text file
#[derive(Debug)]
pub struct FileDidStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileDidStore {
    /// Open the store at `path`; a missing file starts an empty store
    ///
    /// An existing file must parse.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DidStoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        };
        let entries = store.load()?;
        debug!(path = %store.path.display(), entries = entries.len(), "Opened DID store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<Did, Vec<u8>>, DidStoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => parse_entries(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    fn persist(&self, values: &BTreeMap<Did, Vec<u8>>) -> Result<(), DidStoreError> {
        std::fs::write(&self.path, render_entries(values)).map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: std::io::Error) -> DidStoreError {
        DidStoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl DidStore for FileDidStore {
    fn get(&self, did: Did) -> Result<Option<Vec<u8>>, DidStoreError> {
        let _guard = self.lock.lock();
        Ok(self.load()?.remove(&did))
    }

    fn set(&self, did: Did, value: &[u8]) -> Result<(), DidStoreError> {
        let _guard = self.lock.lock();
        let mut values = self.load()?;
        values.insert(did, value.to_vec());
        self.persist(&values)?;
        debug!(did = format!("0x{:04X}", did), value = %hex::encode_upper(value), "DID written");
        Ok(())
    }
}

fn parse_entries(content: &str) -> Result<BTreeMap<Did, Vec<u8>>, DidStoreError> {
    let mut values = BTreeMap::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let malformed = |reason: String| DidStoreError::Malformed {
            line: index + 1,
            reason,
        };

        let mut tokens = line.split_whitespace();
        let did_token = tokens
            .next()
            .ok_or_else(|| malformed("missing DID".to_string()))?;
        if did_token.len() != 4 || !did_token.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(malformed(format!("DID '{}' is not 4 hex digits", did_token)));
        }
        let did = Did::from_str_radix(did_token, 16)
            .map_err(|e| malformed(format!("DID '{}': {}", did_token, e)))?;

        let mut value = Vec::new();
        for token in tokens {
            let byte = hex::decode(token)
                .ok()
                .filter(|bytes| bytes.len() == 1)
                .ok_or_else(|| malformed(format!("'{}' is not a hex byte", token)))?;
            value.extend_from_slice(&byte);
        }

        values.insert(did, value);
    }

    Ok(values)
}

fn render_entries(values: &BTreeMap<Did, Vec<u8>>) -> String {
    let mut out = String::new();
    for (did, value) in values {
        out.push_str(&format!("{:04X}", did));
        for byte in value {
            out.push(' ');
            out.push_str(&hex::encode_upper([*byte]));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dids.txt");

        let store = FileDidStore::open(&path).unwrap();
        store.set(0x01E0, &[0x21]).unwrap();
        store.set(0xF190, &[0x31, 0x32, 0xAB]).unwrap();
        drop(store);

        let reopened = FileDidStore::open(&path).unwrap();
        assert_eq!(reopened.get(0x01E0).unwrap(), Some(vec![0x21]));
        assert_eq!(reopened.get(0xF190).unwrap(), Some(vec![0x31, 0x32, 0xAB]));
    }

    #[test]
    fn file_layout_is_hex_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dids.txt");

        let store = FileDidStore::open(&path).unwrap();
        store.set(0xF190, &[0x0A, 0xFF]).unwrap();
        store.set(0x01E0, &[0x30]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "01E0 30\nF190 0A FF\n");
    }

    #[test]
    fn parses_lowercase_and_skips_blank_lines() {
        let values = parse_entries("# ota\n\n01e0 21\nf405 0a 1b\n").unwrap();
        assert_eq!(values.get(&0x01E0), Some(&vec![0x21]));
        assert_eq!(values.get(&0xF405), Some(&vec![0x0A, 0x1B]));
    }

    #[test]
    fn rejects_bad_byte_token() {
        let err = parse_entries("01E0 2\n").unwrap_err();
        assert!(matches!(err, DidStoreError::Malformed { line: 1, .. }));
    }

    #[test]
    fn instances_on_one_file_see_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dids.txt");
        let ecu = FileDidStore::open(&path).unwrap();
        let flasher = FileDidStore::open(&path).unwrap();

        ecu.set(0x01E0, &[0x20]).unwrap();
        flasher.set(0x01E0, &[0x21]).unwrap();
        assert_eq!(ecu.get(0x01E0).unwrap(), Some(vec![0x21]));

        ecu.set(0xF190, &[0x01]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "01E0 21\nF190 01\n"
        );
    }

    #[test]
    fn failed_write_is_not_visible() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("state");
        std::fs::create_dir(&nested).unwrap();
        let store = FileDidStore::open(nested.join("dids.txt")).unwrap();
        std::fs::remove_dir_all(&nested).unwrap();

        let err = store.set(0x01E0, &[0x21]).unwrap_err();

        assert!(matches!(err, DidStoreError::Io { .. }));
        assert_eq!(store.get(0x01E0).unwrap(), None);
    }

    #[rstest]
    #[case::sign("+1E0 21\n")]
    #[case::short("01E 21\n")]
    #[case::long("001E0 21\n")]
    #[case::not_hex("01G0 21\n")]
    fn rejects_bad_did_token(#[case] content: &str) {
        let err = parse_entries(content).unwrap_err();
        assert!(matches!(err, DidStoreError::Malformed { line: 1, .. }));
    }
}
