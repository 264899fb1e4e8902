//! Polling policy and backoff schedule.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// How the engine paces status queries for a single job.
///
/// Deserializes from plain key/value data with millisecond fields:
///
/// ```yaml
/// initial_interval_ms: 500
/// backoff_factor: 1.5
/// max_interval_ms: 30000
/// timeout_ms: 300000
/// max_attempts: 40
/// ```
///
/// Unknown keys are rejected rather than silently falling back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollPolicy {
    /// Delay before the first status query.
    #[serde(rename = "initial_interval_ms", with = "millis")]
    pub initial_interval: Duration,

    /// Multiplicative growth of the interval after each unsuccessful poll.
    pub backoff_factor: f64,

    /// Upper bound on the interval.
    #[serde(rename = "max_interval_ms", with = "millis")]
    pub max_interval: Duration,

    /// Overall wall-clock budget, measured from submission.
    #[serde(rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,

    /// Optional cap on the number of status queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            backoff_factor: 1.5,
            max_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(5 * 60),
            max_attempts: None,
        }
    }
}

impl PollPolicy {
    /// Poll at a fixed interval with no growth.
    pub fn fixed(interval: Duration, timeout: Duration) -> Self {
        Self {
            initial_interval: interval,
            backoff_factor: 1.0,
            max_interval: interval,
            timeout,
            max_attempts: None,
        }
    }

    /// Set the overall timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cap the number of status queries.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set the backoff growth and its cap.
    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff_factor = factor;
        self.max_interval = max_interval;
        self
    }

    /// Check that the policy describes a terminating schedule.
    pub fn validate(&self) -> EngineResult<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(EngineError::InvalidPolicy(format!(
                "backoff_factor must be a finite number >= 1, got {}",
                self.backoff_factor
            )));
        }
        if self.initial_interval.is_zero() {
            return Err(EngineError::InvalidPolicy(
                "initial_interval must be greater than zero".into(),
            ));
        }
        if self.max_interval < self.initial_interval {
            return Err(EngineError::InvalidPolicy(format!(
                "max_interval ({:?}) is shorter than initial_interval ({:?})",
                self.max_interval, self.initial_interval
            )));
        }
        if self.timeout.is_zero() {
            return Err(EngineError::InvalidPolicy(
                "timeout must be greater than zero".into(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(EngineError::InvalidPolicy(
                "max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Backoff schedule described by this policy.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self)
    }
}

/// Interval schedule between consecutive status queries.
///
/// Starts at the initial interval and multiplies by the backoff factor on
/// every step, saturating at the maximum. The sequence is non-decreasing and
/// never exceeds the maximum.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    factor: f64,
    max: Duration,
}

impl Backoff {
    /// Create the schedule for a policy.
    pub fn new(policy: &PollPolicy) -> Self {
        Self {
            current: policy.initial_interval.min(policy.max_interval),
            factor: policy.backoff_factor.max(1.0),
            max: policy.max_interval,
        }
    }

    /// Interval to wait before the next query.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Grow the interval after an unsuccessful poll.
    pub fn grow(&mut self) {
        let nanos = self.current.as_nanos() as f64 * self.factor;
        let next = if nanos >= self.max.as_nanos() as f64 {
            self.max
        } else {
            Duration::from_nanos(nanos as u64)
        };
        self.current = next.clamp(self.current, self.max);
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let interval = self.current;
        self.grow();
        Some(interval)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_policy_is_valid() {
        PollPolicy::default().validate().unwrap();
    }

    #[test]
    fn test_invalid_policies() {
        let cases = [
            PollPolicy {
                backoff_factor: 0.5,
                ..Default::default()
            },
            PollPolicy {
                backoff_factor: f64::NAN,
                ..Default::default()
            },
            PollPolicy {
                initial_interval: Duration::ZERO,
                ..Default::default()
            },
            PollPolicy {
                initial_interval: Duration::from_secs(10),
                max_interval: Duration::from_secs(1),
                ..Default::default()
            },
            PollPolicy {
                timeout: Duration::ZERO,
                ..Default::default()
            },
            PollPolicy::default().with_max_attempts(0),
        ];
        for policy in cases {
            assert!(
                matches!(policy.validate(), Err(EngineError::InvalidPolicy(_))),
                "expected {policy:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_backoff_sequence() {
        let policy = PollPolicy {
            initial_interval: Duration::from_millis(100),
            backoff_factor: 2.0,
            max_interval: Duration::from_millis(500),
            ..Default::default()
        };
        let intervals: Vec<_> = policy.backoff().take(6).collect();
        assert_eq!(
            intervals,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(500),
                Duration::from_millis(500),
                Duration::from_millis(500),
            ]
        );
    }

    #[test]
    fn test_fixed_policy_does_not_grow() {
        let policy = PollPolicy::fixed(Duration::from_secs(5), Duration::from_secs(60));
        policy.validate().unwrap();
        assert!(policy.backoff().take(10).all(|d| d == Duration::from_secs(5)));
    }

    #[test]
    fn test_policy_from_key_values() {
        let policy: PollPolicy = serde_json::from_str(
            r#"{"initial_interval_ms": 250, "backoff_factor": 2.0, "timeout_ms": 1000, "max_attempts": 4}"#,
        )
        .unwrap();
        assert_eq!(policy.initial_interval, Duration::from_millis(250));
        assert_eq!(policy.timeout, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, Some(4));
        // unspecified fields keep their defaults
        assert_eq!(policy.max_interval, Duration::from_secs(30));

        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["initial_interval_ms"], 250);
    }

    #[test]
    fn test_policy_rejects_unknown_keys() {
        let err = serde_json::from_str::<PollPolicy>(r#"{"timeout": 5000}"#).unwrap_err();
        assert!(err.to_string().contains("unknown field `timeout`"), "{err}");
    }

    proptest! {
        #[test]
        fn backoff_is_bounded_and_non_decreasing(
            initial_ms in 1u64..5_000,
            extra_ms in 0u64..60_000,
            factor in 1.0f64..4.0,
            steps in 1usize..64,
        ) {
            let policy = PollPolicy {
                initial_interval: Duration::from_millis(initial_ms),
                backoff_factor: factor,
                max_interval: Duration::from_millis(initial_ms + extra_ms),
                ..Default::default()
            };
            let intervals: Vec<_> = policy.backoff().take(steps).collect();

            prop_assert_eq!(intervals[0], policy.initial_interval);
            for pair in intervals.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
            for interval in &intervals {
                prop_assert!(*interval <= policy.max_interval);
            }
        }
    }
}
