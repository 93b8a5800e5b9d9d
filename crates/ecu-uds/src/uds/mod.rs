//! UDS (Unified Diagnostic Services) framing
//!
//! Frames on the simulated bus start with a length/control (PCI) byte that
//! counts the bytes following it, then the service id, then service data.

mod nrc;

pub use nrc::NegativeResponseCode;

/// Standard UDS service ID constants
pub mod service_id {
    pub const REQUEST_DOWNLOAD: u8 = 0x34;
    pub const TRANSFER_DATA: u8 = 0x36;
    pub const REQUEST_TRANSFER_EXIT: u8 = 0x37;
    pub const NEGATIVE_RESPONSE: u8 = 0x7F;
}

/// Positive responses echo the request service id plus this offset
pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;

/// PCI byte for a frame whose body (service id onwards) is `body_len` bytes
pub fn pci(body_len: usize) -> u8 {
    u8::try_from(body_len).unwrap_or(u8::MAX)
}

/// Create a positive response frame: `[PCI, SID + 0x40, data...]`
pub fn positive_response(service_id: u8, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(2 + data.len());
    frame.push(pci(1 + data.len()));
    frame.push(service_id.wrapping_add(POSITIVE_RESPONSE_OFFSET));
    frame.extend_from_slice(data);
    frame
}

/// Create a negative response frame: `[PCI, 0x7F, SID, NRC]`
pub fn negative_response(service_id: u8, nrc: NegativeResponseCode) -> Vec<u8> {
    vec![0x03, service_id::NEGATIVE_RESPONSE, service_id, nrc.into()]
}

/// Build a request frame: `[PCI, SID, data...]`
pub fn request(service_id: u8, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(2 + data.len());
    frame.push(pci(1 + data.len()));
    frame.push(service_id);
    frame.extend_from_slice(data);
    frame
}

/// Decoded view of a response frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response<'a> {
    Positive { service_id: u8, data: &'a [u8] },
    Negative { service_id: u8, nrc: NegativeResponseCode },
}

impl<'a> Response<'a> {
    /// Parse a response frame, `None` when it is too short to be one
    pub fn parse(frame: &'a [u8]) -> Option<Self> {
        match frame {
            [_, service_id::NEGATIVE_RESPONSE, sid, nrc, ..] => Some(Self::Negative {
                service_id: *sid,
                nrc: NegativeResponseCode::from(*nrc),
            }),
            [_, sid, data @ ..] if *sid >= POSITIVE_RESPONSE_OFFSET => Some(Self::Positive {
                service_id: sid - POSITIVE_RESPONSE_OFFSET,
                data,
            }),
            _ => None,
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Positive { .. })
    }
}
