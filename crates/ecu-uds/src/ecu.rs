//! OTA request dispatch for one ECU
//!
//! [`OtaEcu`] owns the transfer session and hands it explicitly to the
//! services, so there is exactly one writer per session. The transport layer
//! calls [`OtaEcu::handle_frame`] once per inbound frame, one at a time.

use std::sync::Arc;

use tracing::{debug, info};

use crate::address::FrameAddress;
use crate::config::TransferConfig;
use crate::did::DidStore;
use crate::error::EcuResult;
use crate::negative_response::NegativeResponder;
use crate::ota::{
    CompletionHandler, DownloadParameters, MemoryWriter, OtaStatus, TransferDataService,
    TransferExitOutcome, TransferExitService, TransferSession,
};
use crate::transport::FrameSink;
use crate::uds::{service_id, NegativeResponseCode};

/// What a dispatched frame resulted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// TransferData handled; `accepted` is false when answered with an NRC
    TransferData { accepted: bool },
    /// RequestTransferExit handled
    TransferExit(TransferExitOutcome),
    /// Frame was malformed or named an unsupported service
    Rejected,
}

pub struct OtaEcu {
    store: Arc<dyn DidStore>,
    session: TransferSession,
    transfer_data: TransferDataService,
    transfer_exit: TransferExitService,
    nrc: NegativeResponder,
}

impl OtaEcu {
    pub fn new(config: TransferConfig, sink: Arc<dyn FrameSink>, store: Arc<dyn DidStore>) -> Self {
        Self {
            session: TransferSession::new(config),
            transfer_data: TransferDataService::new(sink.clone(), store.clone()),
            transfer_exit: TransferExitService::new(sink.clone(), store.clone()),
            nrc: NegativeResponder::new(sink),
            store,
        }
    }

    /// Register the handler RequestTransferExit reports its outcome to
    pub fn set_completion_handler(&mut self, handler: CompletionHandler) {
        self.transfer_exit.set_completion_handler(handler);
    }

    /// Configure a new download, as RequestDownload would
    ///
    /// Opens the session and marks the OTA status as processing.
    pub fn begin_download(
        &mut self,
        params: DownloadParameters,
        memory: impl MemoryWriter + 'static,
    ) -> EcuResult<()> {
        self.session.begin(params, memory);
        OtaStatus::Processing.store(self.store.as_ref())?;
        Ok(())
    }

    pub fn session(&self) -> &TransferSession {
        &self.session
    }

    pub fn ota_status(&self) -> EcuResult<OtaStatus> {
        Ok(OtaStatus::load(self.store.as_ref())?)
    }

    /// Route one inbound frame to its service
    pub fn handle_frame(&mut self, address: FrameAddress, frame: &[u8]) -> EcuResult<Dispatch> {
        debug!(%address, frame = %hex::encode_upper(frame), "Received request");

        let Some(&sid) = frame.get(1) else {
            self.nrc.send(
                address.reversed(),
                0x00,
                NegativeResponseCode::IncorrectMessageLengthOrFormat,
            )?;
            return Ok(Dispatch::Rejected);
        };

        match sid {
            service_id::TRANSFER_DATA => {
                let accepted = self
                    .transfer_data
                    .transfer(&mut self.session, address, frame)?;
                Ok(Dispatch::TransferData { accepted })
            }
            service_id::REQUEST_TRANSFER_EXIT => {
                let outcome = self
                    .transfer_exit
                    .request_exit(&mut self.session, address, frame)?;
                info!(
                    success = outcome.success,
                    continue_transfer = outcome.continue_transfer,
                    "Transfer exit handled"
                );
                Ok(Dispatch::TransferExit(outcome))
            }
            other => {
                debug!(service_id = format!("0x{:02X}", other), "Unsupported service");
                self.nrc.send(
                    address.reversed(),
                    other,
                    NegativeResponseCode::IncorrectMessageLengthOrFormat,
                )?;
                Ok(Dispatch::Rejected)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::MemoryDidStore;
    use crate::ota::SimulatedMemory;
    use crate::transport::RecordingSink;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn ecu() -> (Arc<RecordingSink>, OtaEcu) {
        let sink = Arc::new(RecordingSink::new());
        let store = Arc::new(MemoryDidStore::new());
        let ecu = OtaEcu::new(TransferConfig::default(), sink.clone(), store);
        (sink, ecu)
    }

    #[rstest]
    #[case::empty(&[])]
    #[case::pci_only(&[0x01])]
    #[case::transfer_data_without_payload(&[0x02, 0x36, 0x01])]
    #[case::transfer_exit_without_parameter(&[0x01, 0x37])]
    fn short_frames_get_incorrect_length(#[case] frame: &[u8]) {
        let (sink, mut ecu) = ecu();
        ecu.handle_frame(FrameAddress::new(0xFA, 0x11), frame)
            .unwrap();

        let response = sink.last().unwrap();
        assert_eq!(response.address, FrameAddress::new(0x11, 0xFA));
        assert_eq!(response.data[1], 0x7F);
        assert_eq!(response.data[3], 0x13);
    }

    #[test]
    fn unknown_service_is_rejected() {
        let (sink, mut ecu) = ecu();
        let dispatch = ecu
            .handle_frame(FrameAddress::new(0xFA, 0x11), &[0x02, 0x10, 0x03])
            .unwrap();

        assert_eq!(dispatch, Dispatch::Rejected);
        assert_eq!(sink.last().unwrap().data, vec![0x03, 0x7F, 0x10, 0x13]);
    }

    #[test]
    fn begin_download_marks_processing() {
        let (_sink, mut ecu) = ecu();
        ecu.begin_download(
            DownloadParameters {
                memory_address: 0,
                total_size: 8,
                chunk_size: 4,
            },
            SimulatedMemory::new(8),
        )
        .unwrap();

        assert!(ecu.session().is_active());
        assert_eq!(ecu.ota_status().unwrap(), OtaStatus::Processing);
    }
}
