//! Association state and task selection
//!
//! The association decides which task runs next. It is synchronous and takes the
//! current instant as a parameter so scheduling can be tested without a runtime.

use crate::auto::{AutoTask, AutoTasks};
use crate::config::AssociationConfig;
use crate::error::TaskError;
use crate::poll::{Next, PollMap};
use crate::request::ReadRequest;
use crate::retry::ExponentialBackOff;
use crate::task::{Task, TaskKind, TaskOutput};
use dnp3_application::Sequence;
use dnp3_core::{EndpointAddress, EventClasses, Iin};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Connection state of an association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No link state reported yet
    Unknown,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Unknown => write!(f, "unknown"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Master-side view of one outstation
#[derive(Debug)]
pub(crate) struct Association {
    address: EndpointAddress,
    config: AssociationConfig,
    seq: Sequence,
    enabled: bool,
    connection: ConnectionState,
    queue: VecDeque<Task>,
    auto_tasks: AutoTasks,
    polls: PollMap,
}

impl Association {
    /// New association, disabled until [`Association::set_enabled`]
    pub(crate) fn new(address: EndpointAddress, config: AssociationConfig) -> Self {
        Self {
            address,
            config,
            seq: Sequence::default(),
            enabled: false,
            connection: ConnectionState::Unknown,
            queue: VecDeque::new(),
            auto_tasks: AutoTasks::new(),
            polls: PollMap::new(),
        }
    }

    pub(crate) fn address(&self) -> EndpointAddress {
        self.address
    }

    pub(crate) fn config(&self) -> &AssociationConfig {
        &self.config
    }

    pub(crate) fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enabled and connected
    pub(crate) fn is_active(&self) -> bool {
        self.enabled && self.connection == ConnectionState::Connected
    }

    pub(crate) fn is_integrity_complete(&self) -> bool {
        self.auto_tasks.is_integrity_complete()
    }

    /// Sequence number for the next request
    pub(crate) fn increment_seq(&mut self) -> Sequence {
        self.seq.increment()
    }

    fn on_activity_change(&mut self, was_active: bool) {
        if !was_active && self.is_active() {
            log::info!("association {} active, scheduling startup tasks", self.address);
            self.auto_tasks.reset();
        }
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        let was_active = self.is_active();
        self.enabled = enabled;
        self.on_activity_change(was_active);
    }

    /// Apply a link state change
    ///
    /// Losing the link fails every queued command. Other queued tasks and polls stay
    /// for the next connection.
    pub(crate) fn set_connection(&mut self, state: ConnectionState) {
        let was_active = self.is_active();
        self.connection = state;
        if state == ConnectionState::Disconnected {
            let (commands, others): (VecDeque<Task>, VecDeque<Task>) =
                self.queue.drain(..).partition(|task| task.kind.is_command());
            self.queue = others;
            for command in commands {
                command.fail(TaskError::NoConnection);
            }
        }
        self.on_activity_change(was_active);
    }

    /// Queue a user task
    pub(crate) fn submit(&mut self, task: Task) {
        if task.kind.is_command() && self.connection == ConnectionState::Disconnected {
            task.fail(TaskError::NoConnection);
            return;
        }
        if self.queue.len() >= self.config.max_queued_user_requests {
            task.fail(TaskError::TooManyRequests);
            return;
        }
        self.queue.push_back(task);
    }

    pub(crate) fn add_poll(&mut self, request: ReadRequest, period: Duration, now: Instant) -> u64 {
        self.polls.add(request, period, now)
    }

    pub(crate) fn remove_poll(&mut self, id: u64) -> bool {
        self.polls.remove(id)
    }

    pub(crate) fn demand_poll(&mut self, id: u64) -> bool {
        self.polls.demand(id)
    }

    /// Fail every queued task, used on shutdown
    pub(crate) fn fail_all(&mut self, error: TaskError) {
        for task in self.queue.drain(..) {
            task.fail(error.clone());
        }
    }

    /// React to the IIN of any response
    pub(crate) fn process_iin(&mut self, iin: Iin) {
        if iin.iin1.get_device_restart() && self.auto_tasks.on_restart_iin() {
            log::warn!("device restart detected (address {})", self.address);
        }
        if iin.iin1.get_need_time() && self.config.auto_time_sync.is_some() {
            self.auto_tasks.on_need_time();
        }
        if iin.iin2.get_event_buffer_overflow()
            && self.config.auto_integrity_scan_on_buffer_overflow
        {
            log::warn!("event buffer overflow reported by {}", self.address);
            self.auto_tasks.on_buffer_overflow();
        }
        let available = EventClasses::new(
            iin.iin1.get_class_1_events(),
            iin.iin1.get_class_2_events(),
            iin.iin1.get_class_3_events(),
        );
        self.auto_tasks
            .on_events_available(available.intersect(self.config.event_scan_on_events_available));
    }

    /// Pick the next task to execute
    ///
    /// Priority: automatic tasks, then queued user tasks in submission order, then polls.
    pub(crate) fn next_task(&mut self, now: Instant) -> Next<Task> {
        if !self.is_active() {
            return Next::None;
        }

        match self.auto_tasks.next(&self.config, now) {
            Next::None => {}
            other => return other,
        }

        if let Some(front) = self.queue.front() {
            match front.not_before {
                Some(at) if at > now => return Next::NotBefore(at),
                _ => {
                    if let Some(task) = self.queue.pop_front() {
                        return Next::Now(task);
                    }
                }
            }
        }

        match self.polls.next(now) {
            Next::Now(due) => {
                self.polls.start(due.id);
                Next::Now(Task::poll(due))
            }
            Next::NotBefore(at) => Next::NotBefore(at),
            Next::None => Next::None,
        }
    }

    /// Record the outcome of an executed task
    ///
    /// Retryable failures of user and poll tasks go back to the front of the queue after
    /// a backoff delay. Commands and automatic tasks are never requeued here; automatic
    /// tasks back off through their own state.
    pub(crate) fn complete_task(
        &mut self,
        mut task: Task,
        result: Result<TaskOutput, TaskError>,
        now: Instant,
    ) {
        if let Some(auto) = task.auto {
            self.complete_auto_task(auto, &result, now);
            return;
        }

        if let Err(err) = &result {
            if err.is_retryable()
                && !task.kind.is_command()
                && task.retries < self.config.max_task_retries
            {
                task.retries += 1;
                let strategy = self.config.task_retry_strategy;
                let delay = task
                    .backoff
                    .get_or_insert_with(|| ExponentialBackOff::new(strategy))
                    .on_failure();
                log::warn!(
                    "{:?} failed: {}, retry {} of {} in {:?}",
                    task.kind.task_type(),
                    err,
                    task.retries,
                    self.config.max_task_retries,
                    delay
                );
                task.not_before = Some(now + delay);
                self.queue.push_front(task);
                return;
            }
        }

        if let TaskKind::Poll(due) = &task.kind {
            self.polls.complete(due.id, due.demanded, now);
        }
        task.complete(result);
    }

    fn complete_auto_task(
        &mut self,
        auto: AutoTask,
        result: &Result<TaskOutput, TaskError>,
        now: Instant,
    ) {
        match result {
            Ok(_) => self.auto_tasks.on_success(auto),
            Err(TaskError::RejectedByIin2(iin2)) => {
                log::warn!("{:?} rejected by {} ({:?}), not retrying", auto, self.address, iin2);
                self.auto_tasks.abandon(auto);
            }
            Err(TaskError::NoConnection | TaskError::Disabled | TaskError::Shutdown) => {
                // rescheduled when the association becomes active again
            }
            Err(err) => {
                log::warn!("{:?} failed: {}", auto, err);
                self.auto_tasks
                    .on_failure(auto, self.config.auto_tasks_retry_strategy, now);
            }
        }
    }
}
