//! RequestTransferExit (0x37)
//!
//! Request frame: `[PCI, 0x37, transfer_request_parameter]`.
//! The exit succeeds only when the OTA status DID already says every byte
//! arrived; otherwise the transfer is abandoned and the status drops back to
//! idle.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::session::TransferSession;
use super::OtaStatus;
use crate::address::FrameAddress;
use crate::did::DidStore;
use crate::error::EcuResult;
use crate::negative_response::NegativeResponder;
use crate::transport::FrameSink;
use crate::uds::{self, service_id, NegativeResponseCode};

/// PCI + SID + transfer request parameter
const MIN_REQUEST_LEN: usize = 3;

/// Called with the transfer outcome; returns whether to keep accepting
/// transfer traffic
pub type CompletionHandler = Box<dyn FnMut(bool) -> bool + Send>;

/// Result of a RequestTransferExit call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferExitOutcome {
    /// The transfer was finalized with a positive response
    pub success: bool,
    /// The caller should keep accepting transfer traffic
    pub continue_transfer: bool,
}

impl TransferExitOutcome {
    const fn stop(success: bool) -> Self {
        Self {
            success,
            continue_transfer: false,
        }
    }
}

/// Finalizes a download
pub struct TransferExitService {
    sink: Arc<dyn FrameSink>,
    store: Arc<dyn DidStore>,
    nrc: NegativeResponder,
    on_complete: Option<CompletionHandler>,
}

impl TransferExitService {
    pub fn new(sink: Arc<dyn FrameSink>, store: Arc<dyn DidStore>) -> Self {
        Self {
            nrc: NegativeResponder::new(sink.clone()),
            sink,
            store,
            on_complete: None,
        }
    }

    /// Builder-style variant of [`Self::set_completion_handler`]
    pub fn with_completion_handler(mut self, handler: CompletionHandler) -> Self {
        self.on_complete = Some(handler);
        self
    }

    /// Register the completion handler, replacing any previous one
    pub fn set_completion_handler(&mut self, handler: CompletionHandler) {
        self.on_complete = Some(handler);
    }

    /// Handle one RequestTransferExit request received on `address`
    ///
    /// Emits exactly one response frame. A decided exit (positive or
    /// negative) closes `session`; a malformed request leaves it open.
    pub fn request_exit(
        &mut self,
        session: &mut TransferSession,
        address: FrameAddress,
        request: &[u8],
    ) -> EcuResult<TransferExitOutcome> {
        let response_address = address.reversed();

        if request.len() < MIN_REQUEST_LEN {
            debug!(len = request.len(), "RequestTransferExit: request too short");
            self.nrc.send(
                response_address,
                service_id::REQUEST_TRANSFER_EXIT,
                NegativeResponseCode::IncorrectMessageLengthOrFormat,
            )?;
            return Ok(TransferExitOutcome::stop(false));
        }

        let parameter = request[2];
        let status = OtaStatus::load(self.store.as_ref())?;

        if status == OtaStatus::ProcessingTransferComplete {
            self.sink.send_frame(
                response_address,
                &uds::positive_response(service_id::REQUEST_TRANSFER_EXIT, &[parameter]),
            )?;
            OtaStatus::Ready.store(self.store.as_ref())?;

            info!(
                bytes_sent = session.bytes_sent(),
                blocks = session.checksums().len(),
                image_checksum = format!("0x{:02X}", session.image_checksum()),
                "RequestTransferExit: transfer completed"
            );
            session.close();

            let continue_transfer = self.notify(true).unwrap_or(false);
            Ok(TransferExitOutcome {
                success: true,
                continue_transfer,
            })
        } else {
            warn!(?status, "RequestTransferExit: transfer not complete, abandoning");
            self.nrc.send(
                response_address,
                service_id::REQUEST_TRANSFER_EXIT,
                NegativeResponseCode::RequestSequenceError,
            )?;
            OtaStatus::Idle.store(self.store.as_ref())?;
            session.close();

            self.notify(false);
            Ok(TransferExitOutcome::stop(false))
        }
    }

    fn notify(&mut self, success: bool) -> Option<bool> {
        self.on_complete.as_mut().map(|handler| handler(success))
    }
}

impl fmt::Debug for TransferExitService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferExitService")
            .field("has_completion_handler", &self.on_complete.is_some())
            .finish_non_exhaustive()
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
    use std::sync::atomic::{AtomicBool, Ordering};

    const TESTER: FrameAddress = FrameAddress::new(0xFA, 0x11);

    fn setup(status: OtaStatus) -> (Arc<RecordingSink>, Arc<MemoryDidStore>, TransferExitService) {
        let sink = Arc::new(RecordingSink::new());
        let store = Arc::new(MemoryDidStore::new());
        status.store(store.as_ref()).unwrap();
        let service = TransferExitService::new(sink.clone(), store.clone());
        (sink, store, service)
    }

    fn open_session() -> TransferSession {
        let mut session = TransferSession::new(TransferConfig::default());
        session.begin(
            DownloadParameters {
                memory_address: 0,
                total_size: 4,
                chunk_size: 4,
            },
            SimulatedMemory::new(4),
        );
        session
    }

    #[test]
    fn complete_transfer_is_finalized() {
        let (sink, store, mut service) = setup(OtaStatus::ProcessingTransferComplete);
        let mut session = open_session();

        let outcome = service
            .request_exit(&mut session, TESTER, &[0x02, 0x37, 0x00])
            .unwrap();

        assert_eq!(
            outcome,
            TransferExitOutcome {
                success: true,
                continue_transfer: false
            }
        );
        let frame = sink.last().unwrap();
        assert_eq!(frame.address, FrameAddress::new(0x11, 0xFA));
        assert_eq!(frame.data, vec![0x02, 0x77, 0x00]);
        assert_eq!(OtaStatus::load(store.as_ref()).unwrap(), OtaStatus::Ready);
        assert!(!session.is_active());
    }

    #[test]
    fn premature_exit_resets_to_idle() {
        let (sink, store, mut service) = setup(OtaStatus::Processing);
        let mut session = open_session();

        let outcome = service
            .request_exit(&mut session, TESTER, &[0x02, 0x37, 0x00])
            .unwrap();

        assert!(!outcome.success);
        assert!(!outcome.continue_transfer);
        assert_eq!(sink.last().unwrap().data, vec![0x03, 0x7F, 0x37, 0x24]);
        assert_eq!(OtaStatus::load(store.as_ref()).unwrap(), OtaStatus::Idle);
        assert!(!session.is_active());
    }

    #[test]
    fn short_request_leaves_status_and_session() {
        let (sink, store, mut service) = setup(OtaStatus::ProcessingTransferComplete);
        let mut session = open_session();

        let outcome = service
            .request_exit(&mut session, TESTER, &[0x01, 0x37])
            .unwrap();

        assert!(!outcome.continue_transfer);
        assert_eq!(sink.last().unwrap().data, vec![0x03, 0x7F, 0x37, 0x13]);
        assert_eq!(
            OtaStatus::load(store.as_ref()).unwrap(),
            OtaStatus::ProcessingTransferComplete
        );
        assert!(session.is_active());
    }

    #[test]
    fn handler_decides_continuation_on_success() {
        let (_sink, _store, service) = setup(OtaStatus::ProcessingTransferComplete);
        let mut service = service.with_completion_handler(Box::new(|success| success));
        let mut session = open_session();

        let outcome = service
            .request_exit(&mut session, TESTER, &[0x02, 0x37, 0x01])
            .unwrap();

        assert!(outcome.continue_transfer);
    }

    #[test]
    fn handler_is_notified_of_failure_but_cannot_continue() {
        let (_sink, _store, mut service) = setup(OtaStatus::Idle);
        let notified = Arc::new(AtomicBool::new(false));
        let seen = notified.clone();
        service.set_completion_handler(Box::new(move |success| {
            assert!(!success);
            seen.store(true, Ordering::SeqCst);
            true
        }));
        let mut session = open_session();

        let outcome = service
            .request_exit(&mut session, TESTER, &[0x02, 0x37, 0x00])
            .unwrap();

        assert!(notified.load(Ordering::SeqCst));
        assert!(!outcome.continue_transfer);
    }
}
