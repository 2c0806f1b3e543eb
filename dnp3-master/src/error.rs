//! Master error types

use dnp3_application::FileStatus;
use dnp3_core::{CommandStatus, Dnp3Error, EndpointAddress, Iin2};
use dnp3_transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when managing associations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationError {
    #[error("Master channel has been shut down")]
    Shutdown,

    #[error("Master already contains an association with outstation address {0}")]
    DuplicateAddress(EndpointAddress),

    #[error("No association with outstation address {0}")]
    NoSuchAssociation(EndpointAddress),
}

/// Reasons a command response does not confirm the request
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResponseError {
    #[error("Outstation returned status {0}")]
    BadStatus(CommandStatus),

    #[error("Response header count does not match the request")]
    HeaderCountMismatch,

    #[error("Response object count does not match the request")]
    ObjectCountMismatch,

    #[error("Response object does not echo the request")]
    ObjectValueMismatch,
}

/// Reasons a time synchronization fails
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSyncError {
    #[error("System time is not available")]
    SystemTimeNotAvailable,

    #[error("Outstation processing delay {0:?} exceeds the round trip time")]
    BadOutstationTimeDelay(Duration),

    #[error("System clock moved backwards during the procedure")]
    ClockRollback,

    #[error("Time arithmetic overflowed")]
    Overflow,

    #[error("Outstation still requests time")]
    StillNeedsTime,

    #[error("Outstation rejected the request: {0:?}")]
    IinError(Iin2),
}

/// Terminal outcome of a failed master task
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Response headers do not match the request")]
    UnexpectedResponseHeaders,

    #[error("Non-final response fragment without CON")]
    NonFinWithoutCon,

    #[error("First response fragment without FIR")]
    NeverReceivedFir,

    #[error("FIR set on a continuation fragment")]
    UnexpectedFir,

    #[error("Multi-fragment response to a request that requires a single fragment")]
    MultiFragmentResponse,

    #[error("No response within the timeout")]
    ResponseTimeout,

    #[error("Request does not fit in a fragment")]
    WriteError,

    #[error("Outstation rejected the request: {0:?}")]
    RejectedByIin2(Iin2),

    #[error("Outstation did not clear the restart indication")]
    RestartNotCleared,

    #[error("Command failed: {0}")]
    Command(#[from] CommandResponseError),

    #[error("Time synchronization failed: {0}")]
    TimeSync(#[from] TimeSyncError),

    #[error("File operation failed: {0}")]
    File(FileStatus),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Too many requests queued")]
    TooManyRequests,

    #[error("No connection to the outstation")]
    NoConnection,

    #[error("Association is disabled")]
    Disabled,

    #[error("Master channel has been shut down")]
    Shutdown,
}

impl TaskError {
    /// Whether the failure counts against the retry budget rather than failing at once
    ///
    /// Timeouts and protocol errors are retried. Transport, authorization, command, and
    /// lifecycle failures are terminal.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ResponseTimeout
                | Self::MalformedResponse(_)
                | Self::UnexpectedResponseHeaders
                | Self::NonFinWithoutCon
                | Self::NeverReceivedFir
                | Self::UnexpectedFir
                | Self::MultiFragmentResponse
        )
    }
}

impl From<Dnp3Error> for TaskError {
    fn from(err: Dnp3Error) -> Self {
        match err {
            Dnp3Error::WriteOverflow { .. } => TaskError::WriteError,
            Dnp3Error::Timeout => TaskError::ResponseTimeout,
            other => TaskError::MalformedResponse(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(TaskError::ResponseTimeout.is_retryable());
        assert!(TaskError::NonFinWithoutCon.is_retryable());
        assert!(!TaskError::Transport(TransportError::LinkDown).is_retryable());
        let rejected = CommandResponseError::BadStatus(CommandStatus::NoSelect);
        assert!(!TaskError::Command(rejected).is_retryable());
        assert!(!TaskError::Shutdown.is_retryable());
    }

    #[test]
    fn test_codec_error_mapping() {
        let err = TaskError::from(Dnp3Error::WriteOverflow {
            needed: 10,
            remaining: 2,
        });
        assert_eq!(err, TaskError::WriteError);
        assert!(matches!(
            TaskError::from(Dnp3Error::FragmentInvalid("short".to_string())),
            TaskError::MalformedResponse(_)
        ));
    }
}
