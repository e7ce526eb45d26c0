//! Live limiter: the bucket shared between concurrent producers and a
//! timer-driven drain.
//!
//! Offers and drains each take the same lock for their whole
//! admit-or-drain step, so `0 <= level <= capacity` holds for every reader.
//! The drain task runs on one tokio clock and converts elapsed time into
//! whole drain intervals, so a delayed wakeup releases everything it owes
//! instead of one interval's worth.
//!
//! Each drain closes every interval that elapsed since the previous one, one
//! [`TickRecord`] per interval: the first carries everything offered since
//! the previous drain, the rest only release. Offers landing after the last
//! drain belong to an open interval and are never reported, so stopping the
//! task exposes no half-finished tick.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_channel::Sender;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::Result;
use crate::bucket::{Admission, Bucket, BucketConfig, NegativeVolume, drain};
use crate::error::{ConfigError, Error};
use crate::simulator::TickRecord;

#[derive(Debug)]
pub struct LiveLimiter {
    interval: Duration,
    state: Mutex<LiveState>,
}

#[derive(Debug)]
struct LiveState {
    bucket: Bucket,
    open: OpenInterval,
    last_drain: Instant,
}

#[derive(Clone, Copy, Debug, Default)]
struct OpenInterval {
    index: u64,
    incoming: u64,
    accepted: u64,
    dropped: u64,
}

/// Point-in-time view taken under the lock.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LiveSnapshot {
    pub interval: u64,
    pub level: u64,
    pub pending_accepted: u64,
    pub pending_dropped: u64,
}

impl LiveLimiter {
    /// An empty limiter whose drain clock starts now.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidField`] for a zero `interval`.
    pub fn new(
        config: BucketConfig,
        interval: Duration,
    ) -> std::result::Result<Self, ConfigError> {
        Self::starting_at(config, interval, Instant::now())
    }

    /// # Errors
    ///
    /// [`ConfigError::InvalidField`] for a zero `interval`.
    pub fn starting_at(
        config: BucketConfig,
        interval: Duration,
        start: Instant,
    ) -> std::result::Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::InvalidField {
                field: "live.drain_interval",
                message: "drain interval must be greater than zero".to_string(),
            });
        }
        Ok(Self {
            interval,
            state: Mutex::new(LiveState {
                bucket: Bucket::new(config),
                open: OpenInterval::default(),
                last_drain: start,
            }),
        })
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    fn lock(&self) -> MutexGuard<'_, LiveState> {
        // Every critical section leaves the bucket consistent before it can
        // panic, so a poisoned guard is still safe to use.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit `volume` into the bucket right now.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for a negative volume and
    /// [`Error::CounterOverflow`] when the open interval can no longer count
    /// `volume`. Either way the bucket and the open interval are left
    /// untouched.
    pub fn offer(&self, volume: i64) -> Result<Admission> {
        let mut state = self.lock();
        let tick = state.open.index;
        let Ok(incoming) = u64::try_from(volume) else {
            return Err(Error::InvalidInput { tick, volume });
        };
        // accepted and dropped are bounded by incoming, so one check covers all three.
        let Some(total_incoming) = state.open.incoming.checked_add(incoming) else {
            return Err(Error::CounterOverflow { tick, volume });
        };
        let admission = state
            .bucket
            .admit(volume)
            .map_err(|NegativeVolume(volume)| Error::InvalidInput { tick, volume })?;
        state.open.incoming = total_incoming;
        state.open.accepted += admission.accepted;
        state.open.dropped += admission.dropped;
        drop(state);

        if admission.dropped > 0 {
            debug!(
                tick,
                incoming = admission.incoming,
                dropped = admission.dropped,
                "live bucket overflow"
            );
        }
        Ok(admission)
    }

    #[must_use]
    pub fn snapshot(&self) -> LiveSnapshot {
        let state = self.lock();
        LiveSnapshot {
            interval: state.open.index,
            level: state.bucket.level(),
            pending_accepted: state.open.accepted,
            pending_dropped: state.open.dropped,
        }
    }

    /// Drain every whole interval elapsed between the previous drain and
    /// `now`, closing the open interval.
    ///
    /// The bucket is drained under the lock right away; the returned
    /// iterator yields one record per closed interval and is empty if less
    /// than one interval has passed.
    pub fn drain_at(&self, now: Instant) -> ClosedIntervals {
        let mut state = self.lock();
        let elapsed = now.saturating_duration_since(state.last_drain);
        let period = self.interval.as_nanos();
        let intervals = u64::try_from(elapsed.as_nanos() / period).unwrap_or(u64::MAX);
        if intervals == 0 {
            return ClosedIntervals::default();
        }
        let remainder = u64::try_from(elapsed.as_nanos() % period).unwrap_or(0);
        state.last_drain = now
            .checked_sub(Duration::from_nanos(remainder))
            .unwrap_or(now);

        let level = state.bucket.level();
        let rate = state.bucket.config().drain_rate();
        state.bucket.drain_intervals(intervals);
        let open = std::mem::take(&mut state.open);
        state.open.index = open.index.saturating_add(intervals);

        ClosedIntervals {
            next_index: open.index,
            remaining: intervals,
            level,
            rate,
            offered: Some(open),
        }
    }
}

/// Records for the intervals closed by one [`LiveLimiter::drain_at`] call,
/// in index order.
#[derive(Debug, Default)]
pub struct ClosedIntervals {
    next_index: u64,
    remaining: u64,
    level: u64,
    rate: u64,
    offered: Option<OpenInterval>,
}

impl Iterator for ClosedIntervals {
    type Item = TickRecord;

    fn next(&mut self) -> Option<TickRecord> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let drained = drain(self.level, self.rate);
        self.level = drained.level;
        let offered = self.offered.take().unwrap_or_default();
        let index = self.next_index;
        self.next_index = self.next_index.saturating_add(1);

        Some(TickRecord {
            index,
            incoming: offered.incoming,
            accepted: offered.accepted,
            dropped: offered.dropped,
            sent_out: drained.sent,
            level_after_drain: drained.level,
        })
    }
}

/// Drain `limiter` every interval and push each closed interval to `records`
/// until `shutdown` flips to `true`, its sender goes away, or `records` is
/// closed.
pub async fn run_drain(
    limiter: Arc<LiveLimiter>,
    records: Sender<TickRecord>,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = limiter.interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    'drain: loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("drain task stopping");
                    break;
                }
            }
            _ = ticker.tick() => {
                for record in limiter.drain_at(Instant::now()) {
                    debug!(
                        tick = record.index,
                        sent_out = record.sent_out,
                        level = record.level_after_drain,
                        "interval drained"
                    );
                    if records.send(record).await.is_err() {
                        warn!("record receiver closed; stopping drain task");
                        break 'drain;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::LiveLimiter;
    use crate::bucket::BucketConfig;
    use crate::error::{ConfigError, Error};
    use crate::simulator::TickRecord;
    use std::time::Duration;
    use tokio::time::Instant;

    fn limiter(start: Instant) -> LiveLimiter {
        LiveLimiter::starting_at(
            BucketConfig::new(1000, 100).unwrap(),
            Duration::from_millis(100),
            start,
        )
        .unwrap()
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = BucketConfig::new(1000, 100).unwrap();
        assert!(matches!(
            LiveLimiter::new(config, Duration::ZERO),
            Err(ConfigError::InvalidField {
                field: "live.drain_interval",
                ..
            })
        ));
    }

    #[test]
    fn drain_before_first_interval_is_a_no_op() {
        let start = Instant::now();
        let limiter = limiter(start);
        limiter.offer(300).unwrap();
        assert!(
            limiter
                .drain_at(start + Duration::from_millis(99))
                .next()
                .is_none()
        );
        assert_eq!(limiter.snapshot().level, 300);
    }

    #[test]
    fn late_drain_emits_one_record_per_missed_interval() {
        let start = Instant::now();
        let limiter = limiter(start);
        limiter.offer(550).unwrap();

        let records: Vec<TickRecord> = limiter
            .drain_at(start + Duration::from_millis(350))
            .collect();
        let summary: Vec<_> = records
            .iter()
            .map(|r| (r.index, r.incoming, r.sent_out, r.level_after_drain))
            .collect();
        assert_eq!(
            summary,
            [(0, 550, 100, 450), (1, 0, 100, 350), (2, 0, 100, 250)]
        );
        assert_eq!(limiter.snapshot().level, 250);

        // 50ms carried over from the previous drain.
        let records: Vec<TickRecord> = limiter
            .drain_at(start + Duration::from_millis(400))
            .collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].index, 3);
        assert_eq!(records[0].incoming, 0);
        assert_eq!(records[0].sent_out, 100);
        assert_eq!(records[0].level_after_drain, 150);
    }

    #[test]
    fn late_drain_never_sends_more_than_the_rate_per_record() {
        let start = Instant::now();
        let limiter = limiter(start);
        limiter.offer(250).unwrap();

        let sent: Vec<u64> = limiter
            .drain_at(start + Duration::from_millis(500))
            .map(|r| r.sent_out)
            .collect();
        assert_eq!(sent, [100, 100, 50, 0, 0]);
        assert_eq!(limiter.snapshot().interval, 5);
    }

    #[test]
    fn rejected_offer_leaves_open_interval_alone() {
        let start = Instant::now();
        let limiter = limiter(start);
        limiter.offer(40).unwrap();
        assert!(matches!(
            limiter.offer(-5),
            Err(Error::InvalidInput { tick: 0, volume: -5 })
        ));
        let snapshot = limiter.snapshot();
        assert_eq!(snapshot.level, 40);
        assert_eq!(snapshot.pending_accepted, 40);
    }

    #[test]
    fn offer_that_cannot_be_counted_is_refused() {
        let start = Instant::now();
        let limiter = limiter(start);
        limiter.offer(i64::MAX).unwrap();
        limiter.offer(i64::MAX).unwrap();
        let before = limiter.snapshot();
        assert_eq!(before.level, 1000);

        let refused = limiter.offer(i64::MAX).unwrap_err();
        assert!(matches!(refused, Error::CounterOverflow { tick: 0, .. }));
        assert!(refused.is_recoverable());
        assert_eq!(limiter.snapshot(), before);

        let records: Vec<TickRecord> = limiter
            .drain_at(start + Duration::from_millis(100))
            .collect();
        assert_eq!(records[0].incoming, 2 * i64::MAX.unsigned_abs());
        assert_eq!(records[0].accepted + records[0].dropped, records[0].incoming);
    }
}
