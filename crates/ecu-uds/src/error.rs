//! ECU infrastructure errors
//!
//! Protocol violations never show up here: they are answered on the bus with
//! a negative response frame. These variants cover the collaborators a
//! service cannot work without.

use thiserror::Error;

use crate::did::DidStoreError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum EcuError {
    /// Frame could not be put on the bus
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// DID store could not be read or written
    #[error("DID store error: {0}")]
    DidStore(#[from] DidStoreError),
}

pub type EcuResult<T> = Result<T, EcuError>;
