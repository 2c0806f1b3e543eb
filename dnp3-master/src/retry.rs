//! Exponential backoff

use crate::config::RetryStrategy;
use std::time::Duration;

/// Backoff state driven by consecutive failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExponentialBackOff {
    strategy: RetryStrategy,
    current: Option<Duration>,
}

impl ExponentialBackOff {
    #[must_use]
    pub fn new(strategy: RetryStrategy) -> Self {
        Self {
            strategy,
            current: None,
        }
    }

    /// Record a failure and return the delay before the next attempt
    ///
    /// The first failure waits `min_delay`; each further failure doubles the delay up to
    /// `max_delay`.
    pub fn on_failure(&mut self) -> Duration {
        let delay = match self.current {
            None => self.strategy.min_delay,
            Some(previous) => previous
                .checked_mul(2)
                .unwrap_or(self.strategy.max_delay)
                .min(self.strategy.max_delay),
        };
        let delay = delay.max(self.strategy.min_delay);
        self.current = Some(delay);
        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_until_max() {
        let mut backoff = ExponentialBackOff::new(RetryStrategy::default());
        let delays: Vec<u64> = (0..6).map(|_| backoff.on_failure().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 10, 10]);
    }

    #[test]
    fn test_delay_never_below_min() {
        let mut backoff = ExponentialBackOff::new(RetryStrategy::new(
            Duration::from_millis(100),
            Duration::from_millis(50),
        ));
        assert_eq!(backoff.on_failure(), Duration::from_millis(100));
        assert_eq!(backoff.on_failure(), Duration::from_millis(100));
    }
}
