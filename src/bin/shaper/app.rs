use std::path::PathBuf;

use shaper::Result;
use shaper::config::{ArrivalSettings, BurstSettings, Config};
use shaper::error::ConfigError;
use shaper::report::write_outcome;
use shaper::simulator::simulate;
use shaper::telemetry::init_tracing;
use tracing::{info, warn};

use super::cli::{Cli, Command, SimulateArgs};

const DEFAULT_CONFIG: &str = "shaper.toml";

pub async fn run(cli: Cli) -> Result<()> {
    init_tracing(cli.log_filter.as_deref(), cli.json_logs)?;

    let config_path = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = Config::from_env_and_file(&config_path)?;
    info!(
        path = %config_path.display(),
        capacity = config.bucket.capacity(),
        drain_rate = config.bucket.drain_rate(),
        "configuration loaded"
    );

    match cli.command {
        Command::Simulate(args) => run_simulation(config, &args),
        Command::Live(args) => super::live::run(config, args).await,
    }
}

fn run_simulation(mut config: Config, args: &SimulateArgs) -> Result<()> {
    apply_simulate_overrides(&mut config, args)?;

    let outcome = simulate(
        config.bucket,
        config.simulation.arrivals(),
        config.simulation.ticks,
    )?;
    if !outcome.stats.is_conserved() {
        warn!(stats = ?outcome.stats, "aggregate totals do not balance");
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_outcome(&mut out, &outcome, args.format)
}

pub(super) fn apply_simulate_overrides(
    config: &mut Config,
    args: &SimulateArgs,
) -> std::result::Result<(), ConfigError> {
    config.override_bucket(args.bucket.capacity, args.bucket.drain_rate)?;
    if let Some(ticks) = args.ticks {
        config.simulation.ticks = Some(ticks);
    }
    if let Some(volumes) = &args.arrivals {
        config.simulation.arrivals = ArrivalSettings::Fixed(volumes.clone());
    }
    if let Some(seed) = args.burst_seed {
        if config.simulation.ticks.is_none() {
            return Err(ConfigError::InvalidField {
                field: "cli.ticks",
                message: "--burst-seed needs a tick count".to_string(),
            });
        }
        let template = match &config.simulation.arrivals {
            ArrivalSettings::Burst(burst) => *burst,
            ArrivalSettings::Fixed(_) => config.live.burst,
        };
        config.simulation.arrivals = ArrivalSettings::Burst(BurstSettings { seed, ..template });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::apply_simulate_overrides;
    use crate::cli::{BucketArgs, SimulateArgs};
    use shaper::config::{ArrivalSettings, Config};
    use shaper::error::ConfigError;

    #[test]
    fn cli_flags_override_file_values() {
        let mut config = Config::from_toml("[bucket]\ncapacity = 10\n").unwrap();
        let args = SimulateArgs {
            bucket: BucketArgs {
                capacity: Some(500),
                drain_rate: None,
            },
            ticks: Some(4),
            arrivals: Some(vec![1, 2]),
            ..SimulateArgs::default()
        };
        apply_simulate_overrides(&mut config, &args).unwrap();
        assert_eq!(config.bucket.capacity(), 500);
        assert_eq!(config.bucket.drain_rate(), 100);
        assert_eq!(config.simulation.ticks, Some(4));
        assert_eq!(config.simulation.arrivals, ArrivalSettings::Fixed(vec![1, 2]));
    }

    #[test]
    fn burst_seed_without_ticks_is_rejected() {
        let mut config = Config::from_toml("").unwrap();
        let args = SimulateArgs {
            burst_seed: Some(3),
            ..SimulateArgs::default()
        };
        let err = apply_simulate_overrides(&mut config, &args).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "cli.ticks",
                ..
            }
        ));
    }

    #[test]
    fn burst_seed_switches_to_generator() {
        let mut config = Config::from_toml("").unwrap();
        let args = SimulateArgs {
            ticks: Some(25),
            burst_seed: Some(11),
            ..SimulateArgs::default()
        };
        apply_simulate_overrides(&mut config, &args).unwrap();
        assert!(matches!(
            config.simulation.arrivals,
            ArrivalSettings::Burst(burst) if burst.seed == 11
        ));
        assert_eq!(config.simulation.arrivals().take(25).count(), 25);
    }

    #[test]
    fn negative_capacity_flag_is_invalid_configuration() {
        let mut config = Config::from_toml("").unwrap();
        let args = SimulateArgs {
            bucket: BucketArgs {
                capacity: Some(-1),
                drain_rate: None,
            },
            ..SimulateArgs::default()
        };
        assert!(apply_simulate_overrides(&mut config, &args).is_err());
    }
}
