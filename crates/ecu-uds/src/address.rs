//! Frame addressing
//!
//! Every frame on the simulated bus carries a 16-bit identifier with the
//! sender in the high byte and the receiver in the low byte. A response goes
//! back the way the request came, so services swap the two halves exactly
//! once before sending.

use std::fmt;

/// Packed `(sender << 8) | receiver` frame identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameAddress(u16);

impl FrameAddress {
    /// Build an address from its sender and receiver ids
    pub const fn new(sender: u8, receiver: u8) -> Self {
        Self(((sender as u16) << 8) | receiver as u16)
    }

    /// Wrap an already packed identifier
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn sender(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn receiver(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    /// Address for the response to a request received on `self`
    pub const fn reversed(self) -> Self {
        Self::new(self.receiver(), self.sender())
    }
}

impl From<u16> for FrameAddress {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<FrameAddress> for u16 {
    fn from(address: FrameAddress) -> Self {
        address.0
    }
}

impl fmt::Display for FrameAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}
