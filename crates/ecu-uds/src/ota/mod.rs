//! Over-the-air firmware transfer
//!
//! The download step opens a [`TransferSession`], TransferData (0x36) feeds
//! chunks into it, and RequestTransferExit (0x37) closes it after checking
//! the OTA status DID.

mod chunker;
mod memory;
mod session;
mod transfer_data;
mod transfer_exit;

pub use chunker::{ChunkPlanner, PlannedChunk};
pub use memory::{MemoryWriteError, MemoryWriter, SimulatedMemory};
pub use session::{block_checksum, DownloadParameters, TransferSession};
pub use transfer_data::TransferDataService;
pub use transfer_exit::{CompletionHandler, TransferExitOutcome, TransferExitService};

use crate::did::{Did, DidStore, DidStoreError};

/// DID holding the one-byte OTA update status
pub const OTA_UPDATE_STATUS_DID: Did = 0x01E0;

/// OTA update status values stored under [`OTA_UPDATE_STATUS_DID`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtaStatus {
    Idle,
    Init,
    /// Download configured, chunks in flight
    Processing,
    /// Every declared byte has been written
    ProcessingTransferComplete,
    ProcessingTransferFailed,
    /// Transfer finalized, image ready for activation
    Ready,
    Unknown(u8),
}

impl From<u8> for OtaStatus {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Idle,
            0x10 => Self::Init,
            0x20 => Self::Processing,
            0x21 => Self::ProcessingTransferComplete,
            0x22 => Self::ProcessingTransferFailed,
            0x30 => Self::Ready,
            other => Self::Unknown(other),
        }
    }
}

impl From<OtaStatus> for u8 {
    fn from(status: OtaStatus) -> Self {
        match status {
            OtaStatus::Idle => 0x00,
            OtaStatus::Init => 0x10,
            OtaStatus::Processing => 0x20,
            OtaStatus::ProcessingTransferComplete => 0x21,
            OtaStatus::ProcessingTransferFailed => 0x22,
            OtaStatus::Ready => 0x30,
            OtaStatus::Unknown(v) => v,
        }
    }
}

impl OtaStatus {
    /// Read the status from `store`; a missing or empty entry reads as `Idle`
    pub fn load(store: &dyn DidStore) -> Result<Self, DidStoreError> {
        let value = store.get(OTA_UPDATE_STATUS_DID)?;
        Ok(value
            .and_then(|bytes| bytes.first().copied())
            .map(Self::from)
            .unwrap_or(Self::Idle))
    }

    pub fn store(self, store: &dyn DidStore) -> Result<(), DidStoreError> {
        store.set(OTA_UPDATE_STATUS_DID, &[self.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::MemoryDidStore;

    #[test]
    fn missing_status_reads_idle() {
        let store = MemoryDidStore::new();
        assert_eq!(OtaStatus::load(&store).unwrap(), OtaStatus::Idle);

        store.set(OTA_UPDATE_STATUS_DID, &[]).unwrap();
        assert_eq!(OtaStatus::load(&store).unwrap(), OtaStatus::Idle);
    }

    #[test]
    fn status_round_trips_through_store() {
        let store = MemoryDidStore::new();
        OtaStatus::ProcessingTransferComplete.store(&store).unwrap();

        assert_eq!(store.get(OTA_UPDATE_STATUS_DID).unwrap(), Some(vec![0x21]));
        assert_eq!(
            OtaStatus::load(&store).unwrap(),
            OtaStatus::ProcessingTransferComplete
        );
    }

    #[test]
    fn unrecognized_byte_is_kept() {
        assert_eq!(OtaStatus::from(0x99), OtaStatus::Unknown(0x99));
        assert_eq!(u8::from(OtaStatus::Unknown(0x99)), 0x99);
    }
}
