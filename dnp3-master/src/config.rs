//! Master and association configuration

use dnp3_core::{Classes, EndpointAddress, EventClasses};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds of an exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryStrategy {
    /// Delay after the first failure
    pub min_delay: Duration,
    /// Ceiling for the doubled delay
    pub max_delay: Duration,
}

impl RetryStrategy {
    #[must_use]
    pub const fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(10))
    }
}

/// Procedure used to synchronize the outstation clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeSyncProcedure {
    /// RECORD_CURRENT_TIME followed by WRITE g50v3
    Lan,
    /// DELAY_MEASURE followed by WRITE g50v1 corrected for propagation delay
    NonLan,
}

/// Channel-wide master configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Link address of the master
    pub address: EndpointAddress,
    /// Time to wait for each response fragment
    pub response_timeout: Duration,
    /// Largest request fragment the master will build
    pub tx_buffer_size: usize,
}

impl MasterConfig {
    /// Smallest fragment every DNP3 device must accept
    pub const MIN_FRAGMENT_SIZE: usize = 249;

    #[must_use]
    pub fn new(address: EndpointAddress) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    /// Fragment size actually used, never below the protocol minimum
    #[must_use]
    pub fn fragment_size(&self) -> usize {
        self.tx_buffer_size.max(Self::MIN_FRAGMENT_SIZE)
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            address: EndpointAddress::raw(1),
            response_timeout: Duration::from_secs(5),
            tx_buffer_size: 2048,
        }
    }
}

/// Per-outstation association configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    /// Classes for which unsolicited reporting is disabled at startup
    pub disable_unsol_classes: EventClasses,
    /// Classes for which unsolicited reporting is enabled after the integrity poll
    pub enable_unsol_classes: EventClasses,
    /// Classes read by the startup integrity poll
    pub startup_integrity_classes: Classes,
    /// Time synchronization triggered by the NEED_TIME indication
    pub auto_time_sync: Option<TimeSyncProcedure>,
    /// Backoff for failed automatic tasks
    pub auto_tasks_retry_strategy: RetryStrategy,
    /// Backoff for failed user and poll tasks
    pub task_retry_strategy: RetryStrategy,
    /// Retries of a failed user or poll task before it fails terminally
    pub max_task_retries: usize,
    /// Idle time without any received fragment before a link status check
    pub keep_alive_timeout: Option<Duration>,
    /// Run an integrity poll when the outstation reports an event buffer overflow
    pub auto_integrity_scan_on_buffer_overflow: bool,
    /// Event classes read when the outstation reports available events
    pub event_scan_on_events_available: EventClasses,
    /// Maximum number of user requests waiting in the queue
    pub max_queued_user_requests: usize,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            disable_unsol_classes: EventClasses::all(),
            enable_unsol_classes: EventClasses::all(),
            startup_integrity_classes: Classes::all(),
            auto_time_sync: None,
            auto_tasks_retry_strategy: RetryStrategy::default(),
            task_retry_strategy: RetryStrategy::default(),
            max_task_retries: 3,
            keep_alive_timeout: Some(Duration::from_secs(60)),
            auto_integrity_scan_on_buffer_overflow: true,
            event_scan_on_events_available: EventClasses::none(),
            max_queued_user_requests: 16,
        }
    }
}

impl AssociationConfig {
    /// Configuration that performs no automatic tasks besides the integrity poll
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            disable_unsol_classes: EventClasses::none(),
            enable_unsol_classes: EventClasses::none(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AssociationConfig::default();
        assert_eq!(config.max_task_retries, 3);
        assert_eq!(config.task_retry_strategy.min_delay, Duration::from_secs(1));
        assert_eq!(config.task_retry_strategy.max_delay, Duration::from_secs(10));
        assert_eq!(config.keep_alive_timeout, Some(Duration::from_secs(60)));
        assert_eq!(MasterConfig::default().response_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_fragment_size_floor() {
        let config = MasterConfig {
            tx_buffer_size: 10,
            ..MasterConfig::default()
        };
        assert_eq!(config.fragment_size(), 249);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "max_task_retries": 5, "auto_time_sync": "NonLan" }"#;
        let config: AssociationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_task_retries, 5);
        assert_eq!(config.auto_time_sync, Some(TimeSyncProcedure::NonLan));
        assert_eq!(config.max_queued_user_requests, 16);

        let master: MasterConfig = serde_json::from_str(r#"{ "address": 100 }"#).unwrap();
        assert_eq!(master.address, EndpointAddress::raw(100));
    }
}
