//! Arrival suppliers.
//!
//! The simulator accepts any `Iterator<Item = i64>`; these are the ones the
//! binary and the tests build from configuration. Volumes stay signed here so
//! a bad feed reaches admission and is rejected there.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Bursty sample traffic: ten ticks, three of which overflow a 1000-unit
/// bucket draining 100 units per tick.
pub const REFERENCE_ARRIVALS: [i64; 10] = [150, 400, 50, 600, 300, 10, 500, 50, 100, 200];

/// Infinite, seeded random-burst generator.
///
/// Each tick is quiet (`0..=base`) or, with probability `burst_probability`,
/// a burst (`base..=max_burst`). The same seed always yields the same stream.
#[derive(Clone, Debug)]
pub struct BurstArrivals {
    rng: StdRng,
    base: u32,
    max_burst: u32,
    burst_probability: f64,
}

impl BurstArrivals {
    #[must_use]
    pub fn new(seed: u64, base: u32, max_burst: u32, burst_probability: f64) -> Self {
        let burst_probability = if burst_probability.is_nan() {
            0.0
        } else {
            burst_probability
        };
        Self {
            rng: StdRng::seed_from_u64(seed),
            base,
            max_burst: max_burst.max(base),
            burst_probability: burst_probability.clamp(0.0, 1.0),
        }
    }
}

impl Iterator for BurstArrivals {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        let volume = if self.rng.gen_bool(self.burst_probability) {
            self.rng.gen_range(self.base..=self.max_burst)
        } else {
            self.rng.gen_range(0..=self.base)
        };
        Some(i64::from(volume))
    }
}

/// Supplier chosen at runtime from configuration.
#[derive(Clone, Debug)]
pub enum Arrivals {
    Fixed(std::vec::IntoIter<i64>),
    Burst(BurstArrivals),
}

impl Arrivals {
    #[must_use]
    pub fn fixed(volumes: Vec<i64>) -> Self {
        Self::Fixed(volumes.into_iter())
    }

    #[must_use]
    pub fn reference() -> Self {
        Self::fixed(REFERENCE_ARRIVALS.to_vec())
    }
}

impl Iterator for Arrivals {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        match self {
            Self::Fixed(volumes) => volumes.next(),
            Self::Burst(generator) => generator.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Arrivals, BurstArrivals, REFERENCE_ARRIVALS};

    #[test]
    fn reference_supply_is_bounded() {
        let volumes: Vec<i64> = Arrivals::reference().collect();
        assert_eq!(volumes, REFERENCE_ARRIVALS);
        assert_eq!(volumes.iter().sum::<i64>(), 2360);
    }

    #[test]
    fn burst_generator_is_seeded() {
        let a: Vec<i64> = BurstArrivals::new(7, 50, 600, 0.3).take(64).collect();
        let b: Vec<i64> = BurstArrivals::new(7, 50, 600, 0.3).take(64).collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (0..=600).contains(v)));
    }

    #[test]
    fn burst_generator_without_bursts_stays_under_base() {
        assert!(
            BurstArrivals::new(1, 20, 900, 0.0)
                .take(200)
                .all(|v| (0..=20).contains(&v))
        );
    }
}
