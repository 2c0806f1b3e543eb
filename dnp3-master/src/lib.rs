//! Master module for the DNP3 protocol
//!
//! A master talks to one or more outstations ("associations") over a channel. Each
//! association keeps at most one request in flight and schedules work in priority
//! order: automatic tasks (restart handling, unsolicited control, integrity scans,
//! time synchronization, event scans), then user requests in submission order, then
//! periodic polls. Failed tasks are retried with exponential backoff.

pub mod association;
mod auto;
pub mod channel;
pub mod config;
pub mod error;
pub mod handler;
mod poll;
pub mod request;
mod retry;
mod session;
pub mod task;

pub use association::ConnectionState;
pub use channel::{AssociationHandle, MasterChannel, PollHandle};
pub use config::{AssociationConfig, MasterConfig, RetryStrategy, TimeSyncProcedure};
pub use error::{AssociationError, CommandResponseError, TaskError, TimeSyncError};
pub use handler::{
    AssociationHandler, AssociationInformation, HeaderInfo, NullHandler, ReadHandler, ReadType,
    TaskType,
};
pub use request::{CommandHeaders, CommandMode, ReadRequest, RestartType};
pub use task::TaskOutput;
