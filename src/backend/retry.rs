//! Backoff between attempts of a failed generation request.

use std::time::Duration;

use log::debug;
use rand::Rng;

use crate::config::RetryConfig;
use crate::coordination::CancellationSignal;

/// Randomized settle delay followed by a longer wait, both observed in
/// `step` slices so cancellation is noticed promptly.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    settle: (Duration, Duration),
    wait: (Duration, Duration),
    step: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            settle: (
                Duration::from_secs(config.settle_min_secs),
                Duration::from_secs(config.settle_max_secs),
            ),
            wait: (
                Duration::from_secs(config.wait_min_secs),
                Duration::from_secs(config.wait_max_secs),
            ),
            step: Duration::from_secs(1),
        }
    }

    /// No delay at all
    pub fn zero() -> Self {
        Self {
            settle: (Duration::ZERO, Duration::ZERO),
            wait: (Duration::ZERO, Duration::ZERO),
            step: Duration::ZERO,
        }
    }

    fn pick(range: (Duration, Duration)) -> Duration {
        let (min, max) = range;
        if max <= min {
            return min;
        }
        let millis = rand::rng().random_range(min.as_millis()..=max.as_millis());
        Duration::from_millis(millis as u64)
    }

    /// Total delay of one backoff, drawn fresh each call
    pub fn next_delay(&self) -> (Duration, Duration) {
        (Self::pick(self.settle), Self::pick(self.wait))
    }

    /// Wait before the next attempt. Returns true if cancelled meanwhile.
    pub async fn backoff(&self, cancel: &CancellationSignal) -> bool {
        let (settle, wait) = self.next_delay();
        debug!("Retrying generation after {:?} + {:?}", settle, wait);

        if cancel.sleep(settle, self.step).await {
            return true;
        }
        cancel.sleep(wait, self.step).await
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_stay_in_configured_range() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let (settle, wait) = policy.next_delay();
            assert!(settle >= Duration::from_secs(1) && settle <= Duration::from_secs(2));
            assert!(wait >= Duration::from_secs(10) && wait <= Duration::from_secs(20));
        }
    }

    #[test]
    fn test_degenerate_range() {
        let config = RetryConfig {
            settle_min_secs: 3,
            settle_max_secs: 1,
            wait_min_secs: 0,
            wait_max_secs: 0,
        };
        let (settle, wait) = RetryPolicy::from_config(&config).next_delay();
        assert_eq!(settle, Duration::from_secs(3));
        assert_eq!(wait, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_zero_policy_returns_immediately() {
        let cancel = CancellationSignal::local();
        assert!(!RetryPolicy::zero().backoff(&cancel).await);
    }

    #[tokio::test]
    async fn test_backoff_observes_cancellation() {
        let cancel = CancellationSignal::local();
        cancel.cancel().unwrap();
        let start = std::time::Instant::now();
        assert!(RetryPolicy::default().backoff(&cancel).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
