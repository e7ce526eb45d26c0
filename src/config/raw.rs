use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_with::serde_as;

use crate::Result;
use crate::bucket::BucketConfig;
use crate::error::ConfigError;

use super::defaults::{
    default_arrivals, default_burst_base, default_burst_probability, default_burst_seed,
    default_capacity, default_drain_interval, default_drain_rate, default_max_burst,
    default_offer_interval, default_producers,
};
use super::env::{env_duration, env_parse};
use super::{
    ArrivalSettings, BurstSettings, Config, HumantimeDuration, LiveSettings, SimulationSettings,
};

/// A missing file means defaults; any other read failure is reported.
pub(super) fn load(path: impl AsRef<Path>) -> std::result::Result<RawConfig, ConfigError> {
    let path = path.as_ref();
    let mut builder = ::config::Config::builder();
    match std::fs::read_to_string(path) {
        Ok(text) => {
            builder = builder.add_source(::config::File::from_str(
                &text,
                ::config::FileFormat::Toml,
            ));
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ConfigError::FileRead {
                path: path.to_path_buf(),
                source,
            });
        }
    }
    let builder = builder.add_source(
        ::config::Environment::with_prefix("SHAPER")
            .separator("__")
            .try_parsing(true),
    );
    deserialize(builder)
}

pub(super) fn parse(text: &str) -> std::result::Result<RawConfig, ConfigError> {
    let builder = ::config::Config::builder()
        .add_source(::config::File::from_str(text, ::config::FileFormat::Toml));
    deserialize(builder)
}

fn deserialize(
    builder: ::config::ConfigBuilder<::config::builder::DefaultState>,
) -> std::result::Result<RawConfig, ConfigError> {
    builder
        .build()
        .map_err(|err| ConfigError::Other(err.to_string()))?
        .try_deserialize()
        .map_err(|err| ConfigError::Parse(err.to_string()))
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub(super) bucket: RawBucket,
    #[serde(default)]
    pub(super) simulation: RawSimulation,
    #[serde(default)]
    pub(super) live: RawLive,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawBucket {
    #[serde(default = "default_capacity")]
    pub(super) capacity: i64,
    #[serde(default = "default_drain_rate")]
    pub(super) drain_rate: i64,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawSimulation {
    #[serde(default)]
    pub(super) ticks: Option<u64>,
    #[serde(default)]
    pub(super) arrivals: Option<Vec<i64>>,
    #[serde(default)]
    pub(super) burst: Option<RawBurst>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawBurst {
    #[serde(default = "default_burst_seed")]
    pub(super) seed: u64,
    #[serde(default = "default_burst_base")]
    pub(super) base: u32,
    #[serde(default = "default_max_burst")]
    pub(super) max_burst: u32,
    #[serde(default = "default_burst_probability")]
    pub(super) probability: f64,
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub(super) struct RawLive {
    #[serde(default = "default_drain_interval")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) drain_interval: Duration,
    #[serde(default = "default_producers")]
    pub(super) producers: usize,
    #[serde(default = "default_offer_interval")]
    #[serde_as(as = "HumantimeDuration")]
    pub(super) offer_interval: Duration,
    #[serde(default)]
    pub(super) burst: RawBurst,
}

impl RawConfig {
    pub(super) fn apply_env_overrides(&mut self) -> std::result::Result<(), ConfigError> {
        if let Some(capacity) = env_parse::<i64>("SHAPER_CAPACITY")? {
            self.bucket.capacity = capacity;
        }
        if let Some(drain_rate) = env_parse::<i64>("SHAPER_DRAIN_RATE")? {
            self.bucket.drain_rate = drain_rate;
        }
        if let Some(ticks) = env_parse::<u64>("SHAPER_TICKS")? {
            self.simulation.ticks = Some(ticks);
        }
        if let Some(interval) = env_duration("SHAPER_DRAIN_INTERVAL")? {
            self.live.drain_interval = interval;
        }
        Ok(())
    }

    pub(super) fn validate_and_build(self) -> Result<Config> {
        let bucket = BucketConfig::new(self.bucket.capacity, self.bucket.drain_rate)?;

        let arrivals = match (self.simulation.arrivals, self.simulation.burst) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::InvalidField {
                    field: "simulation.arrivals",
                    message: "set either a fixed arrival list or a burst generator, not both"
                        .to_string(),
                }
                .into());
            }
            (Some(volumes), None) => ArrivalSettings::Fixed(volumes),
            (None, Some(burst)) => {
                if self.simulation.ticks.is_none() {
                    return Err(ConfigError::InvalidField {
                        field: "simulation.ticks",
                        message: "a tick count is required with the burst generator".to_string(),
                    }
                    .into());
                }
                ArrivalSettings::Burst(burst.validate("simulation.burst")?)
            }
            (None, None) => ArrivalSettings::Fixed(default_arrivals()),
        };

        if self.live.drain_interval.is_zero() {
            return Err(ConfigError::InvalidField {
                field: "live.drain_interval",
                message: "drain interval must be greater than zero".to_string(),
            }
            .into());
        }
        if self.live.offer_interval.is_zero() {
            return Err(ConfigError::InvalidField {
                field: "live.offer_interval",
                message: "offer interval must be greater than zero".to_string(),
            }
            .into());
        }
        if self.live.producers == 0 {
            return Err(ConfigError::InvalidField {
                field: "live.producers",
                message: "at least one producer is required".to_string(),
            }
            .into());
        }

        Ok(Config {
            bucket,
            simulation: SimulationSettings {
                ticks: self.simulation.ticks,
                arrivals,
            },
            live: LiveSettings {
                drain_interval: self.live.drain_interval,
                producers: self.live.producers,
                offer_interval: self.live.offer_interval,
                burst: self.live.burst.validate("live.burst")?,
            },
        })
    }
}

impl RawBurst {
    fn validate(self, field: &'static str) -> std::result::Result<BurstSettings, ConfigError> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(ConfigError::InvalidField {
                field,
                message: format!(
                    "burst probability must be within 0..=1, got {}",
                    self.probability
                ),
            });
        }
        if self.max_burst < self.base {
            return Err(ConfigError::InvalidField {
                field,
                message: format!(
                    "max_burst ({}) must not be below base ({})",
                    self.max_burst, self.base
                ),
            });
        }
        Ok(BurstSettings {
            seed: self.seed,
            base: self.base,
            max_burst: self.max_burst,
            probability: self.probability,
        })
    }
}

impl Default for RawBucket {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            drain_rate: default_drain_rate(),
        }
    }
}

impl Default for RawBurst {
    fn default() -> Self {
        Self {
            seed: default_burst_seed(),
            base: default_burst_base(),
            max_burst: default_max_burst(),
            probability: default_burst_probability(),
        }
    }
}

impl Default for RawLive {
    fn default() -> Self {
        Self {
            drain_interval: default_drain_interval(),
            producers: default_producers(),
            offer_interval: default_offer_interval(),
            burst: RawBurst::default(),
        }
    }
}
