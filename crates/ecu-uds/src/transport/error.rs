//! Transport layer errors

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection closed")]
    ConnectionClosed,
}
