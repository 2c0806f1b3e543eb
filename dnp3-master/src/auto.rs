//! Automatic tasks injected by the scheduler

use crate::config::{AssociationConfig, RetryStrategy};
use crate::poll::Next;
use crate::retry::ExponentialBackOff;
use crate::task::{Task, TaskKind};
use dnp3_core::{Classes, EventClasses};
use tokio::time::Instant;

/// Identity of an automatic task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum AutoTask {
    ClearRestartBit,
    DisableUnsolicited,
    IntegrityScan,
    TimeSync,
    EnableUnsolicited,
    EventScan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AutoTaskState {
    /// Completed or not required
    Idle,
    /// Needs to run
    Pending,
    /// Failed, waiting for a retry
    Failed(ExponentialBackOff, Instant),
}

impl AutoTaskState {
    pub(crate) fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    fn demand(&mut self) {
        if self.is_idle() {
            *self = Self::Pending;
        }
    }

    fn done(&mut self) {
        *self = Self::Idle;
    }

    fn failure(&mut self, strategy: RetryStrategy, now: Instant) {
        let mut backoff = match self {
            Self::Failed(backoff, _) => backoff.clone(),
            _ => ExponentialBackOff::new(strategy),
        };
        let delay = backoff.on_failure();
        *self = Self::Failed(backoff, now + delay);
    }

    fn next(&self, now: Instant, build: impl FnOnce() -> Task) -> Next<Task> {
        match self {
            Self::Idle => Next::None,
            Self::Pending => Next::Now(build()),
            Self::Failed(_, at) if *at <= now => Next::Now(build()),
            Self::Failed(_, at) => Next::NotBefore(*at),
        }
    }
}

/// States of every automatic task of an association
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AutoTasks {
    clear_restart: AutoTaskState,
    disable_unsolicited: AutoTaskState,
    integrity_scan: AutoTaskState,
    time_sync: AutoTaskState,
    enable_unsolicited: AutoTaskState,
    event_scan: AutoTaskState,
    /// Classes reported as available since the last event scan
    event_scan_classes: EventClasses,
}

impl AutoTasks {
    /// Startup state: disable unsolicited, integrity poll, enable unsolicited
    pub(crate) fn new() -> Self {
        Self {
            clear_restart: AutoTaskState::Idle,
            disable_unsolicited: AutoTaskState::Pending,
            integrity_scan: AutoTaskState::Pending,
            time_sync: AutoTaskState::Idle,
            enable_unsolicited: AutoTaskState::Pending,
            event_scan: AutoTaskState::Idle,
            event_scan_classes: EventClasses::none(),
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    fn state_mut(&mut self, task: AutoTask) -> &mut AutoTaskState {
        match task {
            AutoTask::ClearRestartBit => &mut self.clear_restart,
            AutoTask::DisableUnsolicited => &mut self.disable_unsolicited,
            AutoTask::IntegrityScan => &mut self.integrity_scan,
            AutoTask::TimeSync => &mut self.time_sync,
            AutoTask::EnableUnsolicited => &mut self.enable_unsolicited,
            AutoTask::EventScan => &mut self.event_scan,
        }
    }

    pub(crate) fn is_integrity_complete(&self) -> bool {
        self.integrity_scan.is_idle()
    }

    /// Device restart observed; ignored while a clear is already scheduled
    pub(crate) fn on_restart_iin(&mut self) -> bool {
        if !self.clear_restart.is_idle() {
            return false;
        }
        self.clear_restart.demand();
        self.integrity_scan.demand();
        self.enable_unsolicited.demand();
        true
    }

    pub(crate) fn on_need_time(&mut self) {
        self.time_sync.demand();
    }

    pub(crate) fn on_buffer_overflow(&mut self) {
        self.integrity_scan.demand();
    }

    pub(crate) fn on_events_available(&mut self, classes: EventClasses) {
        if classes.any() {
            self.event_scan_classes = self.event_scan_classes | classes;
            self.event_scan.demand();
        }
    }

    pub(crate) fn on_success(&mut self, task: AutoTask) {
        if task == AutoTask::EventScan {
            self.event_scan_classes = EventClasses::none();
        }
        self.state_mut(task).done();
    }

    pub(crate) fn on_failure(&mut self, task: AutoTask, strategy: RetryStrategy, now: Instant) {
        self.state_mut(task).failure(strategy, now);
    }

    /// Give up on a task the outstation refuses to perform
    pub(crate) fn abandon(&mut self, task: AutoTask) {
        self.state_mut(task).done();
    }

    /// Highest priority automatic task
    ///
    /// A task waiting on its backoff blocks the tasks behind it.
    pub(crate) fn next(&self, config: &AssociationConfig, now: Instant) -> Next<Task> {
        if !self.clear_restart.is_idle() {
            return self.clear_restart.next(now, || {
                Task::auto(AutoTask::ClearRestartBit, TaskKind::ClearRestartBit)
            });
        }

        if config.disable_unsol_classes.any() && !self.disable_unsolicited.is_idle() {
            return self.disable_unsolicited.next(now, || {
                Task::auto(
                    AutoTask::DisableUnsolicited,
                    TaskKind::DisableUnsolicited(config.disable_unsol_classes),
                )
            });
        }

        if !self.integrity_scan.is_idle() {
            return self.integrity_scan.next(now, || {
                Task::auto(
                    AutoTask::IntegrityScan,
                    TaskKind::StartupIntegrity(config.startup_integrity_classes),
                )
            });
        }

        if let Some(procedure) = config.auto_time_sync {
            if !self.time_sync.is_idle() {
                return self.time_sync.next(now, || {
                    Task::auto(AutoTask::TimeSync, TaskKind::TimeSync(procedure))
                });
            }
        }

        if config.enable_unsol_classes.any() && !self.enable_unsolicited.is_idle() {
            return self.enable_unsolicited.next(now, || {
                Task::auto(
                    AutoTask::EnableUnsolicited,
                    TaskKind::EnableUnsolicited(config.enable_unsol_classes),
                )
            });
        }

        if !self.event_scan.is_idle() && self.event_scan_classes.any() {
            let classes = self.event_scan_classes;
            return self.event_scan.next(now, || {
                Task::auto(AutoTask::EventScan, TaskKind::EventScan(classes))
            });
        }

        Next::None
    }
}

/// Read request of an automatic event scan
pub(crate) fn event_scan_classes(classes: EventClasses) -> Classes {
    Classes::new(false, classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeSyncProcedure;
    use std::time::Duration;

    fn kind(next: Next<Task>) -> Option<TaskKind> {
        match next {
            Next::Now(task) => Some(task.kind),
            _ => None,
        }
    }

    #[test]
    fn test_startup_order() {
        let config = AssociationConfig::default();
        let now = Instant::now();
        let mut auto = AutoTasks::new();

        assert_eq!(
            kind(auto.next(&config, now)),
            Some(TaskKind::DisableUnsolicited(EventClasses::all()))
        );
        auto.on_success(AutoTask::DisableUnsolicited);
        assert_eq!(
            kind(auto.next(&config, now)),
            Some(TaskKind::StartupIntegrity(Classes::all()))
        );
        auto.on_success(AutoTask::IntegrityScan);
        assert_eq!(
            kind(auto.next(&config, now)),
            Some(TaskKind::EnableUnsolicited(EventClasses::all()))
        );
        auto.on_success(AutoTask::EnableUnsolicited);
        assert!(matches!(auto.next(&config, now), Next::None));
    }

    #[test]
    fn test_quiet_config_skips_unsolicited() {
        let config = AssociationConfig::quiet();
        let mut auto = AutoTasks::new();
        let now = Instant::now();
        assert_eq!(
            kind(auto.next(&config, now)),
            Some(TaskKind::StartupIntegrity(Classes::all()))
        );
        auto.on_success(AutoTask::IntegrityScan);
        assert!(matches!(auto.next(&config, now), Next::None));
    }

    #[test]
    fn test_restart_demands_clear_first() {
        let config = AssociationConfig::quiet();
        let mut auto = AutoTasks::new();
        let now = Instant::now();
        auto.on_success(AutoTask::IntegrityScan);

        assert!(auto.on_restart_iin());
        assert!(!auto.on_restart_iin());
        assert_eq!(kind(auto.next(&config, now)), Some(TaskKind::ClearRestartBit));
        auto.on_success(AutoTask::ClearRestartBit);
        assert_eq!(
            kind(auto.next(&config, now)),
            Some(TaskKind::StartupIntegrity(Classes::all()))
        );
    }

    #[test]
    fn test_failure_backs_off_and_blocks() {
        let config = AssociationConfig::quiet();
        let mut auto = AutoTasks::new();
        let now = Instant::now();
        auto.on_failure(AutoTask::IntegrityScan, config.auto_tasks_retry_strategy, now);
        assert_eq!(
            auto.next(&config, now).not_before(),
            Some(now + Duration::from_secs(1))
        );
        auto.on_failure(AutoTask::IntegrityScan, config.auto_tasks_retry_strategy, now);
        assert_eq!(
            auto.next(&config, now).not_before(),
            Some(now + Duration::from_secs(2))
        );
        assert!(matches!(
            auto.next(&config, now + Duration::from_secs(2)),
            Next::Now(_)
        ));
    }

    #[test]
    fn test_time_sync_only_when_configured() {
        let mut auto = AutoTasks::new();
        let now = Instant::now();
        let mut config = AssociationConfig::quiet();
        auto.on_success(AutoTask::IntegrityScan);
        auto.on_need_time();
        assert!(matches!(auto.next(&config, now), Next::None));

        config.auto_time_sync = Some(TimeSyncProcedure::Lan);
        assert_eq!(
            kind(auto.next(&config, now)),
            Some(TaskKind::TimeSync(TimeSyncProcedure::Lan))
        );
    }

    #[test]
    fn test_event_scan_accumulates_classes() {
        let config = AssociationConfig::quiet();
        let mut auto = AutoTasks::new();
        let now = Instant::now();
        auto.on_success(AutoTask::IntegrityScan);
        auto.on_events_available(EventClasses::new(true, false, false));
        auto.on_events_available(EventClasses::new(false, false, true));
        assert_eq!(
            kind(auto.next(&config, now)),
            Some(TaskKind::EventScan(EventClasses::new(true, false, true)))
        );
        auto.on_success(AutoTask::EventScan);
        assert!(matches!(auto.next(&config, now), Next::None));
    }

    impl Next<Task> {
        fn not_before(&self) -> Option<Instant> {
            match self {
                Next::NotBefore(at) => Some(*at),
                _ => None,
            }
        }
    }
}
