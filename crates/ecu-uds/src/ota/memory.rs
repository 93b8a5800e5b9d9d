//! Memory-write backend seam

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryWriteError {
    #[error("Write of {len} bytes at offset {offset} exceeds capacity {capacity}")]
    OutOfRange {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("Programming failed at offset {offset}")]
    ProgrammingFailed { offset: usize },
}

/// Target a download writes its chunks into
pub trait MemoryWriter: Send {
    /// Write `data` at `offset` bytes from the start of the download region
    fn write_block(&mut self, offset: usize, data: &[u8]) -> Result<(), MemoryWriteError>;
}

/// RAM-backed stand-in for ECU flash
///
/// Clones share the same buffer, so a test can keep one handle while the
/// session owns another.
#[derive(Debug, Clone)]
pub struct SimulatedMemory {
    buffer: Arc<RwLock<Vec<u8>>>,
    written: Arc<AtomicUsize>,
    fail_next: Arc<AtomicUsize>,
}

impl SimulatedMemory {
    /// Create an erased (0xFF) region of `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Arc::new(RwLock::new(vec![0xFF; capacity])),
            written: Arc::new(AtomicUsize::new(0)),
            fail_next: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.read().len()
    }

    /// Highest offset written so far
    pub fn high_water_mark(&self) -> usize {
        self.written.load(Ordering::SeqCst)
    }

    /// Bytes written so far, from offset 0 up to the high-water mark
    pub fn contents(&self) -> Vec<u8> {
        let end = self.high_water_mark();
        self.buffer.read()[..end].to_vec()
    }

    /// Make the next `count` writes fail with `ProgrammingFailed`
    pub fn fail_next_writes(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }
}

impl MemoryWriter for SimulatedMemory {
    fn write_block(&mut self, offset: usize, data: &[u8]) -> Result<(), MemoryWriteError> {
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(MemoryWriteError::ProgrammingFailed { offset });
        }

        let mut buffer = self.buffer.write();
        let end = offset + data.len();
        if end > buffer.len() {
            return Err(MemoryWriteError::OutOfRange {
                offset,
                len: data.len(),
                capacity: buffer.len(),
            });
        }

        buffer[offset..end].copy_from_slice(data);
        self.written.fetch_max(end, Ordering::SeqCst);
        Ok(())
    }
}
