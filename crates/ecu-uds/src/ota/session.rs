//! Transfer session state
//!
//! One session spans a download configuration and the RequestTransferExit
//! that ends it. Counters stay readable after the session closes so a
//! higher layer can still validate the checksums.

use std::fmt;

use tracing::info;

use super::memory::{MemoryWriteError, MemoryWriter};
use crate::config::TransferConfig;

/// Parameters the download step hands to a new session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadParameters {
    /// Start of the target region, informational only
    pub memory_address: u32,
    /// Declared image size; 0 leaves the transfer unbounded
    pub total_size: usize,
    /// Maximum payload bytes per TransferData request
    pub chunk_size: usize,
}

/// Additive checksum of one chunk (sum of bytes mod 256)
pub fn block_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, byte| acc.wrapping_add(*byte))
}

/// State of one chunked download
pub struct TransferSession {
    config: TransferConfig,
    active: bool,
    memory_address: u32,
    expected_block_sequence_number: u8,
    chunk_size: usize,
    total_size: usize,
    bytes_sent: usize,
    memory_write_status: bool,
    checksums: Vec<u8>,
    memory: Option<Box<dyn MemoryWriter>>,
}

impl TransferSession {
    /// Create a closed session
    pub fn new(config: TransferConfig) -> Self {
        Self {
            expected_block_sequence_number: config.block_counter_start,
            config,
            active: false,
            memory_address: 0,
            chunk_size: 0,
            total_size: 0,
            bytes_sent: 0,
            memory_write_status: false,
            checksums: Vec::new(),
            memory: None,
        }
    }

    /// Open the session for a new download
    ///
    /// Resets every counter, installs `memory` as the write target and
    /// clamps the chunk size to the configured maximum.
    pub fn begin(&mut self, params: DownloadParameters, memory: impl MemoryWriter + 'static) {
        let chunk_size = params.chunk_size.min(self.config.max_chunk_size);

        self.active = true;
        self.memory_address = params.memory_address;
        self.expected_block_sequence_number = self.config.block_counter_start;
        self.chunk_size = chunk_size;
        self.total_size = params.total_size;
        self.bytes_sent = 0;
        self.memory_write_status = false;
        self.checksums.clear();
        self.memory = Some(Box::new(memory));

        info!(
            address = format!("0x{:08X}", params.memory_address),
            total_size = params.total_size,
            chunk_size,
            "Transfer session opened"
        );
    }

    /// End the session and release the memory target
    pub fn close(&mut self) {
        if self.active {
            info!(
                bytes_sent = self.bytes_sent,
                blocks = self.checksums.len(),
                "Transfer session closed"
            );
        }
        self.active = false;
        self.memory = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn memory_address(&self) -> u32 {
        self.memory_address
    }

    pub fn expected_block_sequence_number(&self) -> u8 {
        self.expected_block_sequence_number
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    /// Outcome of the most recent memory write
    pub fn memory_write_status(&self) -> bool {
        self.memory_write_status
    }

    /// Per-chunk checksums in acceptance order
    pub fn checksums(&self) -> &[u8] {
        &self.checksums
    }

    /// Checksums folded into one byte, equal to the additive checksum of
    /// the whole image when every chunk was written once
    pub fn image_checksum(&self) -> u8 {
        block_checksum(&self.checksums)
    }

    /// All declared bytes have been written
    pub fn is_complete(&self) -> bool {
        self.total_size > 0 && self.bytes_sent == self.total_size
    }

    /// Bytes still accepted before the declared size is reached
    pub(crate) fn remaining(&self) -> Option<usize> {
        (self.total_size > 0).then(|| self.total_size - self.bytes_sent)
    }

    pub(crate) fn record_checksum(&mut self, checksum: u8) {
        self.checksums.push(checksum);
    }

    /// Write `data` at the current offset and remember the outcome
    pub(crate) fn write_block(&mut self, data: &[u8]) -> Result<(), MemoryWriteError> {
        let offset = self.bytes_sent;
        let result = match self.memory.as_mut() {
            Some(memory) => memory.write_block(offset, data),
            None => Err(MemoryWriteError::ProgrammingFailed { offset }),
        };
        self.memory_write_status = result.is_ok();
        result
    }

    /// Account for an accepted chunk of `len` bytes
    pub(crate) fn advance(&mut self, len: usize) {
        self.bytes_sent += len;
        self.expected_block_sequence_number = self
            .config
            .next_block(self.expected_block_sequence_number);
    }
}

impl fmt::Debug for TransferSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferSession")
            .field("active", &self.active)
            .field("memory_address", &self.memory_address)
            .field(
                "expected_block_sequence_number",
                &self.expected_block_sequence_number,
            )
            .field("chunk_size", &self.chunk_size)
            .field("total_size", &self.total_size)
            .field("bytes_sent", &self.bytes_sent)
            .field("memory_write_status", &self.memory_write_status)
            .field("checksums", &self.checksums.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ota::SimulatedMemory;

    fn params(chunk_size: usize, total_size: usize) -> DownloadParameters {
        DownloadParameters {
            memory_address: 0x0800_0000,
            total_size,
            chunk_size,
        }
    }

    #[test]
    fn checksum_is_byte_sum() {
        assert_eq!(block_checksum(&[0x01, 0x02, 0x03, 0x04]), 0x0A);
        assert_eq!(block_checksum(&[0xFF, 0x02]), 0x01);
        assert_eq!(block_checksum(&[]), 0x00);
    }

    #[test]
    fn begin_resets_counters() {
        let mut session = TransferSession::new(TransferConfig::default());
        assert!(!session.is_active());

        session.begin(params(4, 8), SimulatedMemory::new(8));
        session.record_checksum(0x0A);
        session.write_block(&[1, 2, 3, 4]).unwrap();
        session.advance(4);
        assert_eq!(session.expected_block_sequence_number(), 2);

        session.begin(params(4, 8), SimulatedMemory::new(8));
        assert!(session.is_active());
        assert_eq!(session.expected_block_sequence_number(), 1);
        assert_eq!(session.bytes_sent(), 0);
        assert!(session.checksums().is_empty());
        assert!(!session.memory_write_status());
    }

    #[test]
    fn chunk_size_is_clamped() {
        let config = TransferConfig {
            max_chunk_size: 16,
            ..Default::default()
        };
        let mut session = TransferSession::new(config);
        session.begin(params(64, 0), SimulatedMemory::new(64));
        assert_eq!(session.chunk_size(), 16);
    }

    #[test]
    fn close_keeps_counters_but_drops_memory() {
        let mut session = TransferSession::new(TransferConfig::default());
        session.begin(params(4, 4), SimulatedMemory::new(4));
        session.record_checksum(0x0A);
        session.write_block(&[1, 2, 3, 4]).unwrap();
        session.advance(4);
        assert!(session.is_complete());

        session.close();
        assert!(!session.is_active());
        assert_eq!(session.checksums(), &[0x0A]);
        assert!(session.write_block(&[0]).is_err());
        assert!(!session.memory_write_status());
    }

    #[test]
    fn unbounded_session_never_completes() {
        let mut session = TransferSession::new(TransferConfig::default());
        session.begin(params(4, 0), SimulatedMemory::new(16));
        session.advance(4);
        assert!(!session.is_complete());
        assert_eq!(session.remaining(), None);
    }
}
