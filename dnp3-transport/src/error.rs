//! Transport error types

use dnp3_core::Dnp3Error;
use thiserror::Error;

/// Failure reported by a fragment sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Link is down")]
    LinkDown,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Transport closed")]
    Closed,
}

impl From<TransportError> for Dnp3Error {
    fn from(err: TransportError) -> Self {
        Dnp3Error::Transport(err.to_string())
    }
}
