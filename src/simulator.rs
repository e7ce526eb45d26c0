//! Tick-driven simulation: one arrival, one admission, one drain per tick.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::Result;
use crate::bucket::{Bucket, BucketConfig, NegativeVolume};
use crate::error::Error;
use crate::stats::{AggregateStats, StatsCollector};

/// What happened during one tick. `index` is zero-based.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct TickRecord {
    pub index: u64,
    pub incoming: u64,
    pub accepted: u64,
    pub dropped: u64,
    pub sent_out: u64,
    pub level_after_drain: u64,
}

/// Lazily steps a fresh bucket through an arrival supply.
///
/// Iterating yields `Ok(record)` per tick and `Err(Error::InvalidInput)` for
/// ticks whose arrival was rejected; it ends when the supply runs dry or the
/// tick limit is reached. A finished simulator is not reusable: build a new
/// one with a new supply to run again.
#[derive(Debug)]
pub struct Simulator<I> {
    bucket: Bucket,
    arrivals: I,
    next_index: u64,
    tick_limit: Option<u64>,
}

impl<I> Simulator<I>
where
    I: Iterator<Item = i64>,
{
    pub fn new(config: BucketConfig, arrivals: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            bucket: Bucket::new(config),
            arrivals: arrivals.into_iter(),
            next_index: 0,
            tick_limit: None,
        }
    }

    /// Stop after `ticks` ticks even if the supply has more.
    #[must_use]
    pub fn with_tick_limit(mut self, ticks: Option<u64>) -> Self {
        self.tick_limit = ticks;
        self
    }

    #[must_use]
    pub const fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    /// Run exactly one tick.
    ///
    /// # Errors
    ///
    /// [`Error::ExhaustedSupply`] when the supply (or tick limit) is used up,
    /// [`Error::InvalidInput`] when the arrival is negative. A rejected
    /// arrival still consumes its tick index but leaves the bucket as it was.
    pub fn step(&mut self) -> Result<TickRecord> {
        let tick = self.next_index;
        if self.tick_limit.is_some_and(|limit| tick >= limit) {
            return Err(Error::ExhaustedSupply { tick });
        }
        let volume = self
            .arrivals
            .next()
            .ok_or(Error::ExhaustedSupply { tick })?;
        self.next_index += 1;

        let admission = self.bucket.admit(volume).map_err(|NegativeVolume(volume)| {
            warn!(tick, volume, "rejecting negative arrival");
            Error::InvalidInput { tick, volume }
        })?;
        if admission.dropped > 0 {
            warn!(
                tick,
                incoming = admission.incoming,
                dropped = admission.dropped,
                "bucket overflow; dropping excess arrivals"
            );
        }
        let drain = self.bucket.drain();

        let record = TickRecord {
            index: tick,
            incoming: admission.incoming,
            accepted: admission.accepted,
            dropped: admission.dropped,
            sent_out: drain.sent,
            level_after_drain: drain.level,
        };
        debug!(
            tick,
            incoming = record.incoming,
            accepted = record.accepted,
            sent_out = record.sent_out,
            level = record.level_after_drain,
            "tick complete"
        );
        Ok(record)
    }
}

impl<I> Iterator for Simulator<I>
where
    I: Iterator<Item = i64>,
{
    type Item = Result<TickRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Err(Error::ExhaustedSupply { tick }) => {
                debug!(ticks = tick, "simulation finished");
                None
            }
            other => Some(other),
        }
    }
}

/// An arrival that was rejected instead of admitted.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct RejectedTick {
    pub index: u64,
    pub volume: i64,
}

/// A completed run.
#[derive(Clone, Debug, Serialize)]
pub struct SimulationOutcome {
    pub config: BucketConfig,
    pub records: Vec<TickRecord>,
    pub rejected: Vec<RejectedTick>,
    pub stats: AggregateStats,
}

/// Drive a fresh simulator to the end of its supply (or `tick_limit`).
///
/// # Errors
///
/// Only errors that end a run are returned; rejected arrivals are collected in
/// [`SimulationOutcome::rejected`].
pub fn simulate<A>(
    config: BucketConfig,
    arrivals: A,
    tick_limit: Option<u64>,
) -> Result<SimulationOutcome>
where
    A: IntoIterator<Item = i64>,
{
    let simulator = Simulator::new(config, arrivals).with_tick_limit(tick_limit);
    let mut collector = StatsCollector::new();
    let mut records = Vec::new();
    let mut rejected = Vec::new();

    for step in simulator {
        match step {
            Ok(record) => {
                collector.record(&record);
                records.push(record);
            }
            Err(Error::InvalidInput { tick, volume }) => {
                rejected.push(RejectedTick {
                    index: tick,
                    volume,
                });
            }
            Err(err) => return Err(err),
        }
    }

    let stats = collector.finish();
    info!(
        ticks = stats.ticks,
        rejected = rejected.len(),
        attempted = stats.total_attempted,
        accepted = stats.total_accepted,
        dropped = stats.total_dropped,
        sent = stats.total_sent,
        final_level = stats.final_level,
        "simulation complete"
    );
    Ok(SimulationOutcome {
        config,
        records,
        rejected,
        stats,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{Simulator, simulate};
    use crate::bucket::BucketConfig;
    use crate::error::Error;

    fn config(capacity: i64, rate: i64) -> BucketConfig {
        BucketConfig::new(capacity, rate).unwrap()
    }

    #[test]
    fn step_past_end_of_supply_reports_exhaustion() {
        let mut sim = Simulator::new(config(10, 1), vec![3]);
        assert!(sim.step().is_ok());
        assert!(matches!(sim.step(), Err(Error::ExhaustedSupply { tick: 1 })));
        assert!(sim.next().is_none());
    }

    #[test]
    fn tick_limit_ends_an_infinite_supply() {
        let sim = Simulator::new(config(10, 5), std::iter::repeat(4)).with_tick_limit(Some(3));
        let indices: Vec<u64> = sim.map(|r| r.unwrap().index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn negative_arrival_skips_tick_without_touching_bucket() {
        let mut sim = Simulator::new(config(100, 10), vec![50, -7, 20]);
        let first = sim.step().unwrap();
        assert_eq!(first.level_after_drain, 40);

        assert!(matches!(
            sim.step(),
            Err(Error::InvalidInput { tick: 1, volume: -7 })
        ));
        assert_eq!(sim.bucket().level(), 40);

        let third = sim.step().unwrap();
        assert_eq!(third.index, 2);
        assert_eq!(third.level_after_drain, 50);
    }

    #[test]
    fn simulate_collects_rejections_and_keeps_going() {
        let outcome = simulate(config(100, 10), vec![30, -1, -2, 30], None).unwrap();
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.rejected.len(), 2);
        assert_eq!(outcome.rejected[0].index, 1);
        assert_eq!(outcome.rejected[1].volume, -2);
        assert_eq!(outcome.stats.total_attempted, 60);
        assert!(outcome.stats.is_conserved());
    }

    #[test]
    fn burst_sheds_up_to_rate_in_its_own_tick() {
        let mut sim = Simulator::new(config(100, 30), vec![100]);
        let record = sim.step().unwrap();
        assert_eq!(record.accepted, 100);
        assert_eq!(record.sent_out, 30);
        assert_eq!(record.level_after_drain, 70);
    }
}
