//! TransferData (0x36)
//!
//! Request frame: `[PCI, 0x36, block_sequence_counter, data...]`.
//! Positive response: `[PCI, 0x76, block_sequence_counter]`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::session::{block_checksum, TransferSession};
use super::OtaStatus;
use crate::address::FrameAddress;
use crate::did::DidStore;
use crate::error::EcuResult;
use crate::negative_response::NegativeResponder;
use crate::transport::FrameSink;
use crate::uds::{self, service_id, NegativeResponseCode};

/// PCI + SID + block counter + at least one data byte
const MIN_REQUEST_LEN: usize = 4;

/// Accepts chunks of an open download
pub struct TransferDataService {
    sink: Arc<dyn FrameSink>,
    store: Arc<dyn DidStore>,
    nrc: NegativeResponder,
}

impl TransferDataService {
    pub fn new(sink: Arc<dyn FrameSink>, store: Arc<dyn DidStore>) -> Self {
        Self {
            nrc: NegativeResponder::new(sink.clone()),
            sink,
            store,
        }
    }

    /// Handle one TransferData request received on `address`
    ///
    /// Emits exactly one response frame. Returns `Ok(true)` when the chunk
    /// was accepted; rejected chunks are answered with an NRC and return
    /// `Ok(false)`. `Err` is reserved for transport and DID store faults.
    pub fn transfer(
        &self,
        session: &mut TransferSession,
        address: FrameAddress,
        request: &[u8],
    ) -> EcuResult<bool> {
        let response_address = address.reversed();

        if request.len() < MIN_REQUEST_LEN {
            debug!(len = request.len(), "TransferData: request too short");
            return self.reject(
                response_address,
                NegativeResponseCode::IncorrectMessageLengthOrFormat,
            );
        }

        if !session.is_active() {
            debug!("TransferData denied: no active transfer");
            return self.reject(response_address, NegativeResponseCode::RequestSequenceError);
        }

        let block_counter = request[2];
        let data = &request[3..];

        if block_counter != session.expected_block_sequence_number() {
            debug!(
                expected = session.expected_block_sequence_number(),
                received = block_counter,
                "TransferData: wrong block sequence counter"
            );
            return self.reject(
                response_address,
                NegativeResponseCode::WrongBlockSequenceCounter,
            );
        }

        if data.len() > session.chunk_size() {
            debug!(
                data_len = data.len(),
                chunk_size = session.chunk_size(),
                "TransferData: chunk exceeds negotiated size"
            );
            return self.reject(
                response_address,
                NegativeResponseCode::IncorrectMessageLengthOrFormat,
            );
        }

        if let Some(remaining) = session.remaining() {
            if data.len() > remaining {
                debug!(
                    bytes_sent = session.bytes_sent(),
                    data_len = data.len(),
                    total = session.total_size(),
                    "TransferData: data exceeds declared size"
                );
                return self.reject(response_address, NegativeResponseCode::TransferDataSuspended);
            }
        }

        // The checksum stays recorded even if the write below fails.
        let checksum = block_checksum(data);
        session.record_checksum(checksum);

        if let Err(e) = session.write_block(data) {
            warn!(
                block = block_counter,
                offset = session.bytes_sent(),
                error = %e,
                "TransferData: memory write failed"
            );
            return self.reject(
                response_address,
                NegativeResponseCode::GeneralProgrammingFailure,
            );
        }

        session.advance(data.len());

        info!(
            block = block_counter,
            bytes = data.len(),
            checksum = format!("0x{:02X}", checksum),
            total_received = session.bytes_sent(),
            total_expected = session.total_size(),
            "TransferData: block received"
        );

        if session.is_complete() {
            info!(
                total_received = session.bytes_sent(),
                image_checksum = format!("0x{:02X}", session.image_checksum()),
                "TransferData: all declared bytes written"
            );
            OtaStatus::ProcessingTransferComplete.store(self.store.as_ref())?;
        }

        self.sink.send_frame(
            response_address,
            &uds::positive_response(service_id::TRANSFER_DATA, &[block_counter]),
        )?;
        Ok(true)
    }

    fn reject(&self, address: FrameAddress, nrc: NegativeResponseCode) -> EcuResult<bool> {
        self.nrc.send(address, service_id::TRANSFER_DATA, nrc)?;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransferConfig;
    use crate::did::MemoryDidStore;
    use crate::ota::{DownloadParameters, SimulatedMemory};
    use crate::transport::RecordingSink;
    use pretty_assertions::assert_eq;

    const TESTER: FrameAddress = FrameAddress::new(0x10, 0x02);

    struct Fixture {
        sink: Arc<RecordingSink>,
        store: Arc<MemoryDidStore>,
        memory: SimulatedMemory,
        service: TransferDataService,
        session: TransferSession,
    }

    fn fixture(chunk_size: usize, total_size: usize) -> Fixture {
        let sink = Arc::new(RecordingSink::new());
        let store = Arc::new(MemoryDidStore::new());
        let memory = SimulatedMemory::new(64);
        let service = TransferDataService::new(sink.clone(), store.clone());
        let mut session = TransferSession::new(TransferConfig::default());
        session.begin(
            DownloadParameters {
                memory_address: 0,
                total_size,
                chunk_size,
            },
            memory.clone(),
        );
        Fixture {
            sink,
            store,
            memory,
            service,
            session,
        }
    }

    fn chunk(block: u8, data: &[u8]) -> Vec<u8> {
        let mut body = vec![block];
        body.extend_from_slice(data);
        uds::request(service_id::TRANSFER_DATA, &body)
    }

    #[test]
    fn accepts_in_order_and_replies_on_reversed_address() {
        let mut f = fixture(4, 0);

        let accepted = f
            .service
            .transfer(&mut f.session, TESTER, &chunk(1, &[0x01, 0x02, 0x03, 0x04]))
            .unwrap();

        assert!(accepted);
        let frame = f.sink.last().unwrap();
        assert_eq!(frame.address, FrameAddress::new(0x02, 0x10));
        assert_eq!(frame.data, vec![0x02, 0x76, 0x01]);
        assert_eq!(f.session.checksums(), &[0x0A]);
        assert_eq!(f.session.bytes_sent(), 4);
        assert_eq!(f.session.expected_block_sequence_number(), 2);
        assert!(f.session.memory_write_status());
        assert_eq!(f.memory.contents(), vec![0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn oversized_chunk_is_rejected() {
        let mut f = fixture(4, 0);

        let accepted = f
            .service
            .transfer(&mut f.session, TESTER, &chunk(1, &[0; 5]))
            .unwrap();

        assert!(!accepted);
        assert_eq!(f.sink.last().unwrap().data, vec![0x03, 0x7F, 0x36, 0x13]);
        assert_eq!(f.session.expected_block_sequence_number(), 1);
        assert!(f.session.checksums().is_empty());
    }

    #[test]
    fn no_session_is_a_sequence_error() {
        let mut f = fixture(4, 0);
        f.session.close();

        f.service
            .transfer(&mut f.session, TESTER, &chunk(1, &[0xAA]))
            .unwrap();

        assert_eq!(f.sink.last().unwrap().data, vec![0x03, 0x7F, 0x36, 0x24]);
        assert_eq!(f.memory.high_water_mark(), 0);
    }

    #[test]
    fn overflowing_declared_size_is_suspended() {
        let mut f = fixture(4, 6);

        f.service
            .transfer(&mut f.session, TESTER, &chunk(1, &[1, 2, 3, 4]))
            .unwrap();
        let accepted = f
            .service
            .transfer(&mut f.session, TESTER, &chunk(2, &[5, 6, 7]))
            .unwrap();

        assert!(!accepted);
        assert_eq!(f.sink.last().unwrap().data, vec![0x03, 0x7F, 0x36, 0x71]);
        assert_eq!(f.session.bytes_sent(), 4);
    }

    #[test]
    fn write_failure_keeps_counter_and_checksum() {
        let mut f = fixture(4, 0);
        f.memory.fail_next_writes(1);

        let accepted = f
            .service
            .transfer(&mut f.session, TESTER, &chunk(1, &[1, 1]))
            .unwrap();

        assert!(!accepted);
        assert_eq!(f.sink.last().unwrap().data, vec![0x03, 0x7F, 0x36, 0x72]);
        assert_eq!(f.session.expected_block_sequence_number(), 1);
        assert_eq!(f.session.bytes_sent(), 0);
        assert_eq!(f.session.checksums(), &[0x02]);
        assert!(!f.session.memory_write_status());

        // Retry of the same block succeeds
        assert!(f
            .service
            .transfer(&mut f.session, TESTER, &chunk(1, &[1, 1]))
            .unwrap());
        assert_eq!(f.session.checksums(), &[0x02, 0x02]);
        assert_eq!(f.session.expected_block_sequence_number(), 2);
    }

    #[test]
    fn final_chunk_marks_transfer_complete() {
        let mut f = fixture(4, 6);

        f.service
            .transfer(&mut f.session, TESTER, &chunk(1, &[1, 2, 3, 4]))
            .unwrap();
        assert_eq!(OtaStatus::load(f.store.as_ref()).unwrap(), OtaStatus::Idle);

        f.service
            .transfer(&mut f.session, TESTER, &chunk(2, &[5, 6]))
            .unwrap();
        assert_eq!(
            OtaStatus::load(f.store.as_ref()).unwrap(),
            OtaStatus::ProcessingTransferComplete
        );
    }

    #[test]
    fn transport_failure_is_an_error() {
        let mut f = fixture(4, 0);
        f.sink.set_connected(false);

        let result = f
            .service
            .transfer(&mut f.session, TESTER, &chunk(1, &[1]));
        assert!(result.is_err());
    }
}
