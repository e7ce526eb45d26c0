use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};
use humantime::parse_duration;
use shaper::report::ReportFormat;

#[derive(Parser, Debug)]
#[command(author, version, about = "Leaky-bucket traffic shaper", long_about = None)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Emit JSON logs (needs `--features json-logs`).
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub json_logs: bool,

    /// Explicit log filter (e.g. "shaper=debug").
    #[arg(long, value_name = "FILTER", global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a tick-driven simulation and print the per-tick report.
    Simulate(SimulateArgs),
    /// Run the live limiter against random-burst producers.
    Live(LiveArgs),
}

#[derive(Args, Debug, Default)]
pub struct BucketArgs {
    /// Bucket capacity in units.
    #[arg(long, allow_negative_numbers = true)]
    pub capacity: Option<i64>,

    /// Units released per tick.
    #[arg(long, allow_negative_numbers = true)]
    pub drain_rate: Option<i64>,
}

#[derive(Args, Debug, Default)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub bucket: BucketArgs,

    /// Stop after this many ticks.
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Comma-separated arrival volumes, one per tick.
    #[arg(
        long,
        value_delimiter = ',',
        allow_negative_numbers = true,
        conflicts_with = "burst_seed"
    )]
    pub arrivals: Option<Vec<i64>>,

    /// Use the random-burst generator with this seed (requires --ticks or a
    /// configured tick count).
    #[arg(long)]
    pub burst_seed: Option<u64>,

    /// Output format.
    #[arg(long, default_value_t = ReportFormat::Table)]
    pub format: ReportFormat,
}

#[derive(Args, Debug, Default)]
pub struct LiveArgs {
    #[command(flatten)]
    pub bucket: BucketArgs,

    /// Drain interval (e.g. "100ms").
    #[arg(long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Stop after this long instead of waiting for Ctrl-C.
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Number of concurrent producers.
    #[arg(long)]
    pub producers: Option<usize>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
