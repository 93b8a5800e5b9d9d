//! Negative response signaling (0x7F)

use std::sync::Arc;

use tracing::warn;

use crate::address::FrameAddress;
use crate::transport::{FrameSink, TransportError};
use crate::uds::{self, NegativeResponseCode};

/// Builds and sends `[PCI, 0x7F, SID, NRC]` frames
#[derive(Clone)]
pub struct NegativeResponder {
    sink: Arc<dyn FrameSink>,
}

impl NegativeResponder {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self { sink }
    }

    /// Send a negative response for `service_id` on `address`
    ///
    /// `address` is the response address, already reversed by the caller.
    /// Codes outside the known table are still sent as their raw byte.
    pub fn send(
        &self,
        address: FrameAddress,
        service_id: u8,
        nrc: impl Into<NegativeResponseCode>,
    ) -> Result<(), TransportError> {
        let nrc = nrc.into();

        match nrc.description() {
            Some(description) => warn!(
                %address,
                service_id = format!("0x{:02X}", service_id),
                nrc = format!("0x{:02X}", nrc),
                "Negative response: {}",
                description
            ),
            None => warn!(
                %address,
                service_id = format!("0x{:02X}", service_id),
                nrc = format!("0x{:02X}", nrc),
                "Negative response: unknown code"
            ),
        }

        self.sink
            .send_frame(address, &uds::negative_response(service_id, nrc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RecordingSink;
    use pretty_assertions::assert_eq;

    #[test]
    fn sends_fixed_shape_frame() {
        let sink = Arc::new(RecordingSink::new());
        let responder = NegativeResponder::new(sink.clone());
        let address = FrameAddress::new(0x02, 0x10);

        responder
            .send(address, 0x36, NegativeResponseCode::WrongBlockSequenceCounter)
            .unwrap();

        let frame = sink.last().unwrap();
        assert_eq!(frame.address, address);
        assert_eq!(frame.data, vec![0x03, 0x7F, 0x36, 0x73]);
    }

    #[test]
    fn unknown_code_is_sent_raw() {
        let sink = Arc::new(RecordingSink::new());
        let responder = NegativeResponder::new(sink.clone());

        responder
            .send(FrameAddress::new(0x02, 0x10), 0x37, 0xE5u8)
            .unwrap();

        assert_eq!(sink.last().unwrap().data, vec![0x03, 0x7F, 0x37, 0xE5]);
    }

    #[test]
    fn transport_failure_propagates() {
        let sink = Arc::new(RecordingSink::new());
        sink.set_connected(false);
        let responder = NegativeResponder::new(sink);

        let err = responder
            .send(
                FrameAddress::new(0x02, 0x10),
                0x36,
                NegativeResponseCode::GeneralProgrammingFailure,
            )
            .unwrap_err();
        assert_eq!(err, TransportError::ConnectionClosed);
    }
}
