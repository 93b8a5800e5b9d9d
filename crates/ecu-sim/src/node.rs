//! Simulated ECU attached to the in-process bus

use std::sync::Arc;

use anyhow::Result;
use crc::{Crc, CRC_32_ISO_HDLC};
use ecu_uds::{
    DidStore, Dispatch, DownloadParameters, EcuResult, Frame, FrameSink, OtaEcu, OtaStatus,
    SimulatedMemory, TransferExitOutcome,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::config::SimConfig;
use crate::firmware::FirmwareImage;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Image accepted after a successful transfer exit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledImage {
    pub version: String,
    pub size: usize,
    pub crc32: u32,
}

/// How the node's run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    /// Last RequestTransferExit outcome, if one arrived
    pub exit: Option<TransferExitOutcome>,
    pub installed: Option<InstalledImage>,
    pub final_status: OtaStatus,
}

pub struct EcuNode {
    ecu_id: String,
    address: u8,
    memory_address: u32,
    chunk_size: usize,
    ecu: OtaEcu,
    store: Arc<dyn DidStore>,
    memory: SimulatedMemory,
    inbox: mpsc::UnboundedReceiver<Frame>,
}

impl EcuNode {
    pub fn new(
        config: &SimConfig,
        sink: Arc<dyn FrameSink>,
        store: Arc<dyn DidStore>,
        inbox: mpsc::UnboundedReceiver<Frame>,
    ) -> Self {
        let mut ecu = OtaEcu::new(config.transfer.counters.clone(), sink, store.clone());
        ecu.set_completion_handler(Box::new(|success| {
            info!(success, "Transfer completion reported");
            false
        }));

        Self {
            ecu_id: config.ecu.id.clone(),
            address: config.ecu.address,
            memory_address: config.transfer.memory_address,
            chunk_size: config.transfer.chunk_size,
            ecu,
            store,
            memory: SimulatedMemory::new(config.transfer.memory_size),
            inbox,
        }
    }

    /// Open a download of `total_size` bytes into the simulated flash
    pub fn begin_download(&mut self, total_size: usize) -> EcuResult<()> {
        self.ecu.begin_download(
            DownloadParameters {
                memory_address: self.memory_address,
                total_size,
                chunk_size: self.chunk_size,
            },
            self.memory.clone(),
        )
    }

    pub fn memory(&self) -> &SimulatedMemory {
        &self.memory
    }

    /// Serve frames until a transfer exit stops the session or the bus closes
    pub async fn run(mut self) -> Result<NodeReport> {
        info!(ecu = %self.ecu_id, address = format!("0x{:02X}", self.address), "ECU node listening");

        let mut exit = None;
        while let Some(frame) = self.inbox.recv().await {
            if frame.address.receiver() != self.address {
                trace!(address = %frame.address, "Frame for another node ignored");
                continue;
            }

            if let Dispatch::TransferExit(outcome) =
                self.ecu.handle_frame(frame.address, &frame.data)?
            {
                exit = Some(outcome);
                if !outcome.continue_transfer {
                    break;
                }
            }
        }

        let installed = match exit {
            Some(outcome) if outcome.success => self.install()?,
            _ => None,
        };

        let final_status = self.ecu.ota_status()?;
        debug!(?final_status, "ECU node stopped");

        Ok(NodeReport {
            exit,
            installed,
            final_status,
        })
    }

    /// Verify the received image, marking the transfer failed when it is unusable
    fn install(&self) -> Result<Option<InstalledImage>> {
        let contents = self.memory.contents();
        let verified = FirmwareImage::parse(&contents)
            .and_then(|image| image.check_target(&self.ecu_id).map(|()| image));

        match verified {
            Ok(image) => {
                let installed = InstalledImage {
                    version: image.version,
                    size: contents.len(),
                    crc32: CRC32.checksum(&contents),
                };
                info!(
                    version = %installed.version,
                    size = installed.size,
                    crc32 = format!("0x{:08X}", installed.crc32),
                    "Firmware image verified"
                );
                Ok(Some(installed))
            }
            Err(e) => {
                error!(error = %e, "Received image failed verification");
                OtaStatus::ProcessingTransferFailed.store(self.store.as_ref())?;
                Ok(None)
            }
        }
    }
}
