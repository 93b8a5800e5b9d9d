//! Recording sink for testing

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;

use super::{Frame, FrameSink, TransportError};
use crate::address::FrameAddress;

/// Keeps every frame sent through it
#[derive(Debug)]
pub struct RecordingSink {
    connected: AtomicBool,
    frames: RwLock<Vec<Frame>>,
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            frames: RwLock::new(Vec::new()),
        }
    }

    /// All frames sent so far
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.read().clone()
    }

    /// Most recent frame, if any
    pub fn last(&self) -> Option<Frame> {
        self.frames.read().last().cloned()
    }

    /// Drain the recorded frames
    pub fn take(&self) -> Vec<Frame> {
        std::mem::take(&mut *self.frames.write())
    }

    /// Set connection state; a disconnected sink fails every send
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl FrameSink for RecordingSink {
    fn send_frame(&self, address: FrameAddress, data: &[u8]) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        tracing::debug!(%address, ?data, "Recording sink: frame sent");
        self.frames.write().push(Frame::new(address, data.to_vec()));
        Ok(())
    }
}
