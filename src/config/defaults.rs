use std::time::Duration;

use crate::supply::REFERENCE_ARRIVALS;

pub(super) const fn default_capacity() -> i64 {
    1000
}

pub(super) const fn default_drain_rate() -> i64 {
    100
}

pub(super) fn default_arrivals() -> Vec<i64> {
    REFERENCE_ARRIVALS.to_vec()
}

pub(super) const fn default_burst_seed() -> u64 {
    0x5eed
}

pub(super) const fn default_burst_base() -> u32 {
    50
}

pub(super) const fn default_max_burst() -> u32 {
    600
}

pub(super) const fn default_burst_probability() -> f64 {
    0.25
}

pub(super) const fn default_drain_interval() -> Duration {
    Duration::from_millis(100)
}

pub(super) const fn default_producers() -> usize {
    4
}

pub(super) const fn default_offer_interval() -> Duration {
    Duration::from_millis(40)
}
