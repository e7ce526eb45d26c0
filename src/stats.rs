use serde::Serialize;

use crate::simulator::TickRecord;

/// Totals over a run.
///
/// Per-tick quantities are `u64`; the totals are widened so a long run of
/// large arrivals cannot wrap them.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct AggregateStats {
    pub ticks: u64,
    pub total_attempted: u128,
    pub total_accepted: u128,
    pub total_dropped: u128,
    pub total_sent: u128,
    pub final_level: u64,
}

impl AggregateStats {
    /// Whether the totals satisfy both conservation laws: every attempted
    /// unit was either accepted or dropped, and everything accepted but not
    /// yet sent is still in the bucket.
    #[must_use]
    pub fn is_conserved(&self) -> bool {
        self.total_attempted == self.total_accepted + self.total_dropped
            && self.total_accepted == self.total_sent + u128::from(self.final_level)
    }
}

/// Running fold over tick records.
#[derive(Debug, Default)]
pub struct StatsCollector {
    stats: AggregateStats,
}

impl StatsCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: &TickRecord) {
        let stats = &mut self.stats;
        stats.ticks += 1;
        stats.total_attempted += u128::from(record.incoming);
        stats.total_accepted += u128::from(record.accepted);
        stats.total_dropped += u128::from(record.dropped);
        stats.total_sent += u128::from(record.sent_out);
        stats.final_level = record.level_after_drain;
    }

    #[must_use]
    pub const fn finish(self) -> AggregateStats {
        self.stats
    }
}

impl<'a> Extend<&'a TickRecord> for StatsCollector {
    fn extend<T: IntoIterator<Item = &'a TickRecord>>(&mut self, records: T) {
        for record in records {
            self.record(record);
        }
    }
}

/// Sum a record sequence. An empty sequence folds to all zeroes.
pub fn fold<'a>(records: impl IntoIterator<Item = &'a TickRecord>) -> AggregateStats {
    let mut collector = StatsCollector::new();
    collector.extend(records);
    collector.finish()
}

#[cfg(test)]
mod tests {
    use super::{AggregateStats, fold};
    use crate::simulator::TickRecord;

    fn record(index: u64, incoming: u64, accepted: u64, sent_out: u64, level: u64) -> TickRecord {
        TickRecord {
            index,
            incoming,
            accepted,
            dropped: incoming - accepted,
            sent_out,
            level_after_drain: level,
        }
    }

    #[test]
    fn empty_run_folds_to_zero() {
        let stats = fold(&Vec::<TickRecord>::new());
        assert_eq!(stats, AggregateStats::default());
        assert!(stats.is_conserved());
    }

    #[test]
    fn final_level_comes_from_last_record() {
        let records = [record(0, 80, 80, 30, 50), record(1, 70, 50, 30, 70)];
        let stats = fold(&records);
        assert_eq!(stats.ticks, 2);
        assert_eq!(stats.total_attempted, 150);
        assert_eq!(stats.total_accepted, 130);
        assert_eq!(stats.total_dropped, 20);
        assert_eq!(stats.total_sent, 60);
        assert_eq!(stats.final_level, 70);
        assert!(stats.is_conserved());
    }

    #[test]
    fn totals_do_not_wrap_past_u64() {
        let huge = record(0, u64::MAX, u64::MAX, 0, u64::MAX);
        let stats = fold(&[huge, huge, huge]);
        assert_eq!(stats.total_attempted, 3 * u128::from(u64::MAX));
        assert_eq!(stats.total_accepted, 3 * u128::from(u64::MAX));
        assert_eq!(stats.final_level, u64::MAX);
    }

    #[test]
    fn tampered_totals_are_not_conserved() {
        let mut stats = fold(&[record(0, 10, 10, 5, 5)]);
        stats.total_sent += 1;
        assert!(!stats.is_conserved());
    }
}
