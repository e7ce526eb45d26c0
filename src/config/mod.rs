use std::path::Path;
use std::time::Duration;

use crate::Result;
use crate::bucket::BucketConfig;
use crate::error::{ConfigError, Error as ShaperError};
use crate::supply::{Arrivals, BurstArrivals};

mod defaults;
mod env;
mod raw;
mod serde;

pub(crate) use serde::HumantimeDuration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bucket: BucketConfig,
    pub simulation: SimulationSettings,
    pub live: LiveSettings,
}

#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub ticks: Option<u64>,
    pub arrivals: ArrivalSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrivalSettings {
    Fixed(Vec<i64>),
    Burst(BurstSettings),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstSettings {
    pub seed: u64,
    pub base: u32,
    pub max_burst: u32,
    pub probability: f64,
}

#[derive(Debug, Clone)]
pub struct LiveSettings {
    pub drain_interval: Duration,
    pub producers: usize,
    pub offer_interval: Duration,
    pub burst: BurstSettings,
}

impl Config {
    /// Load configuration from an optional TOML file and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed,
    /// when an environment override is malformed, or when the resulting
    /// values fail validation.
    pub fn from_env_and_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut raw = raw::load(path).map_err(ShaperError::from)?;
        raw.apply_env_overrides().map_err(ShaperError::from)?;
        raw.validate_and_build()
    }

    /// Load configuration from TOML text alone, without consulting the
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error when the text does not parse or fails validation.
    pub fn from_toml(text: &str) -> Result<Self> {
        raw::parse(text)
            .map_err(ShaperError::from)?
            .validate_and_build()
    }

    /// Replace bucket parameters, revalidating them.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidField`] when the new capacity is not positive or
    /// the new drain rate is negative.
    pub fn override_bucket(
        &mut self,
        capacity: Option<i64>,
        drain_rate: Option<i64>,
    ) -> std::result::Result<(), ConfigError> {
        if capacity.is_none() && drain_rate.is_none() {
            return Ok(());
        }
        let current = |value: u64| i64::try_from(value).unwrap_or(i64::MAX);
        self.bucket = BucketConfig::new(
            capacity.unwrap_or_else(|| current(self.bucket.capacity())),
            drain_rate.unwrap_or_else(|| current(self.bucket.drain_rate())),
        )?;
        Ok(())
    }

    /// Replace live-run parameters, applying the same checks as the file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidField`] for a zero drain interval or zero
    /// producers; nothing is changed in that case.
    pub fn override_live(
        &mut self,
        drain_interval: Option<Duration>,
        producers: Option<usize>,
    ) -> std::result::Result<(), ConfigError> {
        if drain_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(ConfigError::InvalidField {
                field: "live.drain_interval",
                message: "drain interval must be greater than zero".to_string(),
            });
        }
        if producers == Some(0) {
            return Err(ConfigError::InvalidField {
                field: "live.producers",
                message: "at least one producer is required".to_string(),
            });
        }
        if let Some(interval) = drain_interval {
            self.live.drain_interval = interval;
        }
        if let Some(producers) = producers {
            self.live.producers = producers;
        }
        Ok(())
    }
}

impl SimulationSettings {
    /// A fresh supplier; every call starts the sequence from the beginning.
    #[must_use]
    pub fn arrivals(&self) -> Arrivals {
        match &self.arrivals {
            ArrivalSettings::Fixed(volumes) => Arrivals::fixed(volumes.clone()),
            ArrivalSettings::Burst(burst) => Arrivals::Burst(burst.generator()),
        }
    }
}

impl BurstSettings {
    #[must_use]
    pub fn generator(&self) -> BurstArrivals {
        BurstArrivals::new(self.seed, self.base, self.max_burst, self.probability)
    }
}
