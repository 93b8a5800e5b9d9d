//! Transport seam for outgoing frames
//!
//! Services only ever send: the receive side (sockets, threads, dispatch)
//! belongs to whoever drives [`crate::OtaEcu`]. This module provides:
//! - [`FrameSink`], the trait services write responses to
//! - [`ChannelSink`], which puts frames on an in-process tokio channel
//! - [`RecordingSink`], which keeps every frame for inspection in tests

mod channel;
pub mod error;
pub mod mock;

pub use channel::ChannelSink;
pub use error::TransportError;
pub use mock::RecordingSink;

use crate::address::FrameAddress;

/// A frame on the simulated bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Packed sender/receiver identifier
    pub address: FrameAddress,
    /// PCI byte followed by the UDS payload
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(address: FrameAddress, data: Vec<u8>) -> Self {
        Self { address, data }
    }
}

/// Outgoing side of the frame transport
pub trait FrameSink: Send + Sync {
    /// Send `data` addressed with `address`
    fn send_frame(&self, address: FrameAddress, data: &[u8]) -> Result<(), TransportError>;
}
