//! Units of work executed by an association

use crate::auto::AutoTask;
use crate::config::TimeSyncProcedure;
use crate::error::TaskError;
use crate::handler::{ReadType, TaskType};
use crate::poll::DuePoll;
use crate::request::{CommandHeaders, CommandMode, ReadRequest, RestartType};
use crate::retry::ExponentialBackOff;
use dnp3_core::{Classes, EventClasses};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Successful result of a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutput {
    Done,
    /// Restart delay reported by the outstation
    Delay(Duration),
    /// Contents of a file read
    File(Vec<u8>),
}

pub(crate) type Promise = oneshot::Sender<Result<TaskOutput, TaskError>>;

/// What a task does on the wire
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TaskKind {
    Read {
        request: ReadRequest,
        read_type: ReadType,
    },
    Poll(DuePoll),
    StartupIntegrity(Classes),
    EventScan(EventClasses),
    Command {
        mode: CommandMode,
        headers: CommandHeaders,
    },
    TimeSync(TimeSyncProcedure),
    Restart(RestartType),
    LinkStatus,
    FileRead {
        file_name: String,
        max_block_size: u16,
    },
    ClearRestartBit,
    EnableUnsolicited(EventClasses),
    DisableUnsolicited(EventClasses),
}

impl TaskKind {
    pub(crate) fn task_type(&self) -> TaskType {
        match self {
            Self::Read { .. } => TaskType::UserRead,
            Self::Poll(_) => TaskType::PeriodicPoll,
            Self::StartupIntegrity(_) => TaskType::StartupIntegrity,
            Self::EventScan(_) => TaskType::AutoEventScan,
            Self::Command { .. } => TaskType::Command,
            Self::TimeSync(_) => TaskType::TimeSync,
            Self::Restart(_) => TaskType::Restart,
            Self::LinkStatus => TaskType::LinkStatus,
            Self::FileRead { .. } => TaskType::FileRead,
            Self::ClearRestartBit => TaskType::ClearRestartBit,
            Self::EnableUnsolicited(_) => TaskType::EnableUnsolicited,
            Self::DisableUnsolicited(_) => TaskType::DisableUnsolicited,
        }
    }

    /// Commands must never be repeated without the user asking again
    pub(crate) const fn is_command(&self) -> bool {
        matches!(self, Self::Command { .. })
    }
}

/// A queued or running task
#[derive(Debug)]
pub(crate) struct Task {
    pub(crate) kind: TaskKind,
    /// Set for tasks injected by the scheduler
    pub(crate) auto: Option<AutoTask>,
    promise: Option<Promise>,
    pub(crate) retries: usize,
    pub(crate) backoff: Option<ExponentialBackOff>,
    /// Earliest start of a retried task
    pub(crate) not_before: Option<Instant>,
}

impl Task {
    pub(crate) fn user(kind: TaskKind, promise: Promise) -> Self {
        Self {
            kind,
            auto: None,
            promise: Some(promise),
            retries: 0,
            backoff: None,
            not_before: None,
        }
    }

    pub(crate) fn auto(auto: AutoTask, kind: TaskKind) -> Self {
        Self {
            kind,
            auto: Some(auto),
            promise: None,
            retries: 0,
            backoff: None,
            not_before: None,
        }
    }

    pub(crate) fn poll(poll: DuePoll) -> Self {
        Self {
            kind: TaskKind::Poll(poll),
            auto: None,
            promise: None,
            retries: 0,
            backoff: None,
            not_before: None,
        }
    }

    /// Resolve the task's future, if anyone is waiting on it
    pub(crate) fn complete(self, result: Result<TaskOutput, TaskError>) {
        if let Some(promise) = self.promise {
            // the submitter may have stopped waiting
            let _ = promise.send(result);
        }
    }

    pub(crate) fn fail(self, error: TaskError) {
        self.complete(Err(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_complete_resolves_promise() {
        let (tx, rx) = oneshot::channel();
        let task = Task::user(TaskKind::LinkStatus, tx);
        task.fail(TaskError::NoConnection);
        assert_eq!(rx.await.unwrap(), Err(TaskError::NoConnection));
    }

    #[test]
    fn test_complete_without_receiver() {
        let (tx, rx) = oneshot::channel();
        drop(rx);
        Task::user(TaskKind::LinkStatus, tx).complete(Ok(TaskOutput::Done));
        Task::auto(AutoTask::IntegrityScan, TaskKind::StartupIntegrity(Classes::all()))
            .complete(Ok(TaskOutput::Done));
    }
}
