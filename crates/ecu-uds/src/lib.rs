//! ecu-uds - UDS transfer services for simulated ECUs
//!
//! This crate implements the ECU side of an over-the-air firmware transfer:
//! TransferData (0x36) and RequestTransferExit (0x37), the negative response
//! taxonomy they share, and the data identifier store that carries the OTA
//! status between them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         OtaEcu                               │
//! │  Routes inbound frames, owns one TransferSession            │
//! │                                                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐  │
//! │  │TransferData  │  │TransferExit  │  │NegativeResponder │  │
//! │  │   (0x36)     │  │   (0x37)     │  │   (0x7F)         │  │
//! │  └──────┬───────┘  └──────┬───────┘  └────────┬─────────┘  │
//! │         │                 │                   │            │
//! │  ┌──────┴───────┐  ┌──────┴───────┐  ┌────────┴─────────┐  │
//! │  │MemoryWriter  │  │  DidStore    │  │    FrameSink     │  │
//! │  │(flash/sim)   │  │(file/memory) │  │ (bus/recording)  │  │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod address;
pub mod config;
pub mod did;
pub mod ecu;
pub mod error;
pub mod negative_response;
pub mod ota;
pub mod transport;
pub mod uds;

pub use address::FrameAddress;
pub use config::TransferConfig;
pub use did::{DidStore, DidStoreError, FileDidStore, MemoryDidStore};
pub use ecu::{Dispatch, OtaEcu};
pub use error::{EcuError, EcuResult};
pub use negative_response::NegativeResponder;
pub use ota::{
    ChunkPlanner, CompletionHandler, DownloadParameters, MemoryWriteError, MemoryWriter,
    OtaStatus, SimulatedMemory, TransferDataService, TransferExitOutcome, TransferExitService,
    TransferSession, OTA_UPDATE_STATUS_DID,
};
pub use transport::{ChannelSink, Frame, FrameSink, RecordingSink, TransportError};
pub use uds::NegativeResponseCode;
