//! In-process bus sink

use tokio::sync::mpsc;
use tracing::debug;

use super::{Frame, FrameSink, TransportError};
use crate::address::FrameAddress;

/// Sends frames into an unbounded tokio channel
///
/// The receiving half plays the role of the bus: whoever holds it sees every
/// frame the ECU emits.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Frame>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Frame>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiver that observes its frames
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl FrameSink for ChannelSink {
    fn send_frame(&self, address: FrameAddress, data: &[u8]) -> Result<(), TransportError> {
        debug!(%address, frame = %hex::encode_upper(data), "Bus: frame sent");
        self.tx
            .send(Frame::new(address, data.to_vec()))
            .map_err(|_| TransportError::ConnectionClosed)
    }
}
