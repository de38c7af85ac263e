//! Retry policy and exponential backoff for remote polling.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of retries after a failed poll.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default delay before the first retry.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Default ceiling for the retry delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_initial_backoff() -> Duration {
    DEFAULT_INITIAL_BACKOFF
}

fn default_max_backoff() -> Duration {
    DEFAULT_MAX_BACKOFF
}

/// How a failing poll is retried before the failure becomes fatal.
///
/// `max_retries: 0` fails on the first transport error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt (default: 5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry (default: 1s).
    #[serde(default = "default_initial_backoff", with = "humantime_serde")]
    pub initial_backoff: Duration,
    /// Upper bound for the doubling delay (default: 60s).
    #[serde(default = "default_max_backoff", with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn fail_fast() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Tracks consecutive failures and the next retry delay.
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    current: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(policy: RetryPolicy) -> Self {
        let current = policy.initial_backoff;
        Self {
            policy,
            current,
            failures: 0,
        }
    }

    /// Record a failure. Returns the delay before the next attempt, or
    /// `None` once the retry budget is spent.
    pub fn mark_failure(&mut self) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        if self.failures > self.policy.max_retries {
            return None;
        }
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.policy.max_backoff);
        Some(delay.min(self.policy.max_backoff))
    }

    /// Reset after a successful attempt.
    pub fn mark_success(&mut self) {
        self.current = self.policy.initial_backoff;
        self.failures = 0;
    }

    /// Consecutive failures recorded so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_delays_double_up_to_cap() {
        let mut backoff = Backoff::new(policy(10));
        let delays: Vec<_> = (0..5).map(|_| backoff.mark_failure().unwrap()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(5),
                Duration::from_secs(5),
            ]
        );
    }

    #[test]
    fn test_budget_exhausted() {
        let mut backoff = Backoff::new(policy(2));
        assert!(backoff.mark_failure().is_some());
        assert!(backoff.mark_failure().is_some());
        assert!(backoff.mark_failure().is_none());
        assert_eq!(backoff.failures(), 3);
    }

    #[test]
    fn test_fail_fast() {
        let mut backoff = Backoff::new(RetryPolicy::fail_fast());
        assert!(backoff.mark_failure().is_none());
        assert_eq!(backoff.failures(), 1);
    }

    #[test]
    fn test_success_resets() {
        let mut backoff = Backoff::new(policy(2));
        backoff.mark_failure();
        backoff.mark_failure();
        backoff.mark_success();
        assert_eq!(backoff.failures(), 0);
        assert_eq!(backoff.mark_failure(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_policy_deserialize_defaults() {
        let policy: RetryPolicy = serde_yaml::from_str("max_retries: 3").unwrap();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_backoff, DEFAULT_INITIAL_BACKOFF);
        assert_eq!(policy.max_backoff, DEFAULT_MAX_BACKOFF);

        let policy: RetryPolicy =
            serde_yaml::from_str("initial_backoff: 500ms\nmax_backoff: 2m").unwrap();
        assert_eq!(policy.initial_backoff, Duration::from_millis(500));
        assert_eq!(policy.max_backoff, Duration::from_secs(120));
    }
}
