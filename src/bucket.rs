//! Bounded accumulator plus the admission and drain policies that mutate it.
//!
//! Both policies are plain functions over `(level, capacity | rate)`, so the
//! simulator and the live limiter share exactly the same arithmetic. [`Bucket`]
//! wraps them and owns the level, keeping `0 <= level <= capacity` at every
//! point a caller can observe.

use serde::Serialize;
use thiserror::Error;

use crate::error::ConfigError;

/// Validated, immutable bucket parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct BucketConfig {
    capacity: u64,
    drain_rate: u64,
}

impl BucketConfig {
    /// Validate raw parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when `capacity <= 0` or
    /// `drain_rate < 0`.
    pub fn new(capacity: i64, drain_rate: i64) -> Result<Self, ConfigError> {
        let capacity = u64::try_from(capacity)
            .ok()
            .filter(|c| *c > 0)
            .ok_or_else(|| ConfigError::InvalidField {
                field: "bucket.capacity",
                message: format!("capacity must be greater than zero, got {capacity}"),
            })?;
        let drain_rate = u64::try_from(drain_rate).map_err(|_| ConfigError::InvalidField {
            field: "bucket.drain_rate",
            message: format!("drain rate must be non-negative, got {drain_rate}"),
        })?;
        Ok(Self {
            capacity,
            drain_rate,
        })
    }

    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    #[must_use]
    pub const fn drain_rate(&self) -> u64 {
        self.drain_rate
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("arrival volume must be non-negative, got {0}")]
pub struct NegativeVolume(pub i64);

/// Outcome of admitting one arrival.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Admission {
    pub incoming: u64,
    pub accepted: u64,
    pub dropped: u64,
    pub level: u64,
}

/// Outcome of one drain step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Drain {
    pub sent: u64,
    pub level: u64,
}

/// Exact-fit-or-saturate admission.
///
/// Accepts everything that fits in `capacity - level` and drops the rest; a
/// negative volume is rejected before any arithmetic happens.
///
/// # Errors
///
/// Returns [`NegativeVolume`] when `incoming < 0`.
pub fn admit(level: u64, capacity: u64, incoming: i64) -> Result<Admission, NegativeVolume> {
    let incoming = u64::try_from(incoming).map_err(|_| NegativeVolume(incoming))?;
    debug_assert!(level <= capacity);
    let space = capacity - level;

    let admission = if incoming <= space {
        Admission {
            incoming,
            accepted: incoming,
            dropped: 0,
            level: level + incoming,
        }
    } else {
        Admission {
            incoming,
            accepted: space,
            dropped: incoming - space,
            level: capacity,
        }
    };
    debug_assert_eq!(admission.accepted + admission.dropped, incoming);
    Ok(admission)
}

/// Release up to `rate` units.
#[must_use]
pub fn drain(level: u64, rate: u64) -> Drain {
    let sent = level.min(rate);
    Drain {
        sent,
        level: level - sent,
    }
}

#[derive(Clone, Debug)]
pub struct Bucket {
    config: BucketConfig,
    level: u64,
}

impl Bucket {
    /// An empty bucket.
    #[must_use]
    pub const fn new(config: BucketConfig) -> Self {
        Self { config, level: 0 }
    }

    #[must_use]
    pub const fn level(&self) -> u64 {
        self.level
    }

    #[must_use]
    pub const fn config(&self) -> BucketConfig {
        self.config
    }

    /// Admit `incoming` and store the resulting level.
    ///
    /// # Errors
    ///
    /// Returns [`NegativeVolume`] and leaves the level untouched when
    /// `incoming < 0`.
    pub fn admit(&mut self, incoming: i64) -> Result<Admission, NegativeVolume> {
        let admission = admit(self.level, self.config.capacity, incoming)?;
        self.level = admission.level;
        Ok(admission)
    }

    /// Drain one tick's worth.
    pub fn drain(&mut self) -> Drain {
        self.drain_intervals(1)
    }

    /// Drain `intervals` ticks' worth at once, for callers that missed ticks.
    pub fn drain_intervals(&mut self, intervals: u64) -> Drain {
        let outcome = drain(
            self.level,
            self.config.drain_rate.saturating_mul(intervals),
        );
        self.level = outcome.level;
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{Bucket, BucketConfig, NegativeVolume, admit, drain};
    use crate::error::ConfigError;

    fn config(capacity: i64, rate: i64) -> BucketConfig {
        BucketConfig::new(capacity, rate).unwrap()
    }

    #[test]
    fn config_rejects_non_positive_capacity() {
        for capacity in [0, -5] {
            match BucketConfig::new(capacity, 10) {
                Err(ConfigError::InvalidField { field, .. }) => {
                    assert_eq!(field, "bucket.capacity");
                }
                other => panic!("expected capacity rejection, got {other:?}"),
            }
        }
    }

    #[test]
    fn config_rejects_negative_rate_but_allows_zero() {
        assert!(matches!(
            BucketConfig::new(10, -1),
            Err(ConfigError::InvalidField {
                field: "bucket.drain_rate",
                ..
            })
        ));
        assert_eq!(config(10, 0).drain_rate(), 0);
    }

    #[test]
    fn admit_exact_fit_drops_nothing() {
        let admission = admit(700, 1000, 300).unwrap();
        assert_eq!(admission.accepted, 300);
        assert_eq!(admission.dropped, 0);
        assert_eq!(admission.level, 1000);
    }

    #[test]
    fn admit_one_over_drops_one() {
        let admission = admit(700, 1000, 301).unwrap();
        assert_eq!(admission.accepted, 300);
        assert_eq!(admission.dropped, 1);
        assert_eq!(admission.level, 1000);
    }

    #[test]
    fn admit_into_full_bucket_drops_everything() {
        let admission = admit(1000, 1000, 42).unwrap();
        assert_eq!(admission.accepted, 0);
        assert_eq!(admission.dropped, 42);
    }

    #[test]
    fn admit_rejects_negative_volume() {
        assert_eq!(admit(0, 10, -3), Err(NegativeVolume(-3)));
    }

    #[test]
    fn drain_is_bounded_by_level_and_rate() {
        let partial = drain(40, 100);
        assert_eq!((partial.sent, partial.level), (40, 0));
        let full = drain(450, 100);
        assert_eq!((full.sent, full.level), (100, 350));
        let stalled = drain(450, 0);
        assert_eq!((stalled.sent, stalled.level), (0, 450));
    }

    #[test]
    fn bucket_keeps_level_on_rejected_input() {
        let mut bucket = Bucket::new(config(100, 10));
        bucket.admit(60).unwrap();
        assert!(bucket.admit(-1).is_err());
        assert_eq!(bucket.level(), 60);
        let fill = bucket.admit(40).unwrap();
        assert_eq!((fill.accepted, fill.dropped), (40, 0));
    }

    #[test]
    fn drain_intervals_releases_missed_ticks() {
        let mut bucket = Bucket::new(config(1000, 100));
        bucket.admit(550).unwrap();
        let outcome = bucket.drain_intervals(3);
        assert_eq!(outcome.sent, 300);
        assert_eq!(bucket.level(), 250);
        let outcome = bucket.drain_intervals(u64::MAX);
        assert_eq!(outcome.sent, 250);
        assert_eq!(bucket.level(), 0);
    }
}
