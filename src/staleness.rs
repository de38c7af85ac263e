//! Freshness check for reading timestamps.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::record::Reading;

/// Default maximum distance between a sample timestamp and now.
pub const DEFAULT_STALE_THRESHOLD: Duration = Duration::from_secs(120);

/// Timestamp format emitted by `rtl_433` in its `time` field.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of a staleness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Reading carries no timestamp.
    Unchecked,
    /// Timestamp is within the threshold.
    Fresh,
    /// Timestamp is further than the threshold from now.
    Stale { age: Duration },
    /// Timestamp is present but not in [`TIME_FORMAT`].
    Unparseable,
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }
}

/// Flags readings whose embedded timestamp is too far from the current time.
///
/// The check only logs; it never drops a reading.
#[derive(Debug, Clone)]
pub struct StalenessChecker {
    threshold: Duration,
}

impl Default for StalenessChecker {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_THRESHOLD)
    }
}

impl StalenessChecker {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Check a reading against the current UTC time.
    pub fn check(&self, reading: &Reading) -> Staleness {
        match reading.time.as_deref() {
            Some(time) => self.check_at(time, Utc::now()),
            None => Staleness::Unchecked,
        }
    }

    /// Check a raw timestamp against `now`, logging a warning when it is stale.
    pub fn check_at(&self, time: &str, now: DateTime<Utc>) -> Staleness {
        let sample = match NaiveDateTime::parse_from_str(time, TIME_FORMAT) {
            Ok(ts) => ts.and_utc(),
            Err(e) => {
                tracing::warn!(time = %time, error = %e, "Unparseable sample timestamp");
                return Staleness::Unparseable;
            }
        };

        // abs() keeps the delta non-negative, so to_std() cannot fail
        let age = (now - sample).abs().to_std().unwrap_or(Duration::MAX);
        if age > self.threshold {
            tracing::warn!(
                time = %time,
                age_secs = age.as_secs(),
                threshold_secs = self.threshold.as_secs(),
                "Out of date sample"
            );
            Staleness::Stale { age }
        } else {
            Staleness::Fresh
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        NaiveDateTime::parse_from_str("2024-05-01 12:00:00", TIME_FORMAT)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn test_fresh_sample() {
        let checker = StalenessChecker::default();
        assert_eq!(
            checker.check_at("2024-05-01 11:59:00", now()),
            Staleness::Fresh
        );
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let checker = StalenessChecker::default();
        assert_eq!(
            checker.check_at("2024-05-01 11:58:00", now()),
            Staleness::Fresh
        );
    }

    #[test]
    fn test_stale_sample() {
        let checker = StalenessChecker::default();
        let outcome = checker.check_at("2024-05-01 11:57:59", now());
        assert_eq!(
            outcome,
            Staleness::Stale {
                age: Duration::from_secs(121)
            }
        );
        assert!(outcome.is_stale());
    }

    #[test]
    fn test_future_sample_beyond_threshold_is_stale() {
        let checker = StalenessChecker::default();
        assert!(checker.check_at("2024-05-01 12:05:00", now()).is_stale());
    }

    #[test]
    fn test_custom_threshold() {
        let checker = StalenessChecker::new(Duration::from_secs(10));
        assert!(checker.check_at("2024-05-01 11:59:45", now()).is_stale());
    }

    #[test]
    fn test_unparseable_timestamp() {
        let checker = StalenessChecker::default();
        assert_eq!(
            checker.check_at("yesterday", now()),
            Staleness::Unparseable
        );
    }

    #[test]
    fn test_reading_without_time_is_unchecked() {
        let reading = Reading::parse(r#"{"model":"X"}"#).unwrap();
        assert_eq!(
            StalenessChecker::default().check(&reading),
            Staleness::Unchecked
        );
    }

    #[test]
    fn test_reading_with_current_time_is_fresh() {
        let time = Utc::now().format(TIME_FORMAT).to_string();
        let reading = Reading::parse(&format!(r#"{{"time":"{time}"}}"#)).unwrap();
        assert_eq!(StalenessChecker::default().check(&reading), Staleness::Fresh);
    }
}
