//! Rendering for simulation outcomes and live records. Pure formatting: the
//! core never writes to the console itself.

use std::fmt::{self, Display};
use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::simulator::{SimulationOutcome, TickRecord};
use crate::stats::AggregateStats;

const RULE: &str = "------------------------------------------------------------------";

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Table,
    Json,
}

impl ReportFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Json => "json",
        }
    }
}

impl Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" | "text" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown report format: {other}")),
        }
    }
}

/// Write `outcome` in the requested format.
///
/// # Errors
///
/// Returns an error if writing to `out` or JSON encoding fails.
pub fn write_outcome<W: Write>(
    out: &mut W,
    outcome: &SimulationOutcome,
    format: ReportFormat,
) -> Result<()> {
    match format {
        ReportFormat::Table => {
            write_table(out, outcome)?;
            writeln!(out)?;
            write_summary(out, "Simulation Summary:", &outcome.stats)?;
        }
        ReportFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, outcome)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Configuration banner plus one row per tick.
pub fn write_table<W: Write>(out: &mut W, outcome: &SimulationOutcome) -> std::io::Result<()> {
    writeln!(out, "--- Leaky Bucket Congestion Control Simulation ---")?;
    writeln!(out)?;
    writeln!(out, "Configuration:")?;
    writeln!(out, "  Bucket Capacity: {} units", outcome.config.capacity())?;
    writeln!(
        out,
        "  Output Rate (Leak Rate): {} units/tick",
        outcome.config.drain_rate()
    )?;
    writeln!(
        out,
        "  Total Ticks: {}",
        outcome.records.len() + outcome.rejected.len()
    )?;
    write_header(out)?;
    for record in &outcome.records {
        write_row(out, record)?;
    }
    writeln!(out, "{RULE}")?;

    if !outcome.rejected.is_empty() {
        writeln!(out)?;
        writeln!(out, "Rejected Arrivals:")?;
        for rejected in &outcome.rejected {
            writeln!(
                out,
                "  Tick {}: negative volume {}",
                rejected.index + 1,
                rejected.volume
            )?;
        }
    }
    Ok(())
}

pub fn write_header<W: Write>(out: &mut W) -> std::io::Result<()> {
    writeln!(out, "{RULE}")?;
    writeln!(
        out,
        "| Tick | Incoming | Accepted | Dropped | Current Level | Sent Out |"
    )?;
    writeln!(out, "{RULE}")
}

/// One table row; ticks are shown one-based.
pub fn write_row<W: Write>(out: &mut W, record: &TickRecord) -> std::io::Result<()> {
    writeln!(
        out,
        "| {:>4} | {:>8} | {:>8} | {:>7} | {:>13} | {:>8} |",
        record.index + 1,
        record.incoming,
        record.accepted,
        record.dropped,
        record.level_after_drain,
        record.sent_out
    )
}

/// Totals under a `title` line naming the kind of run.
pub fn write_summary<W: Write>(
    out: &mut W,
    title: &str,
    stats: &AggregateStats,
) -> std::io::Result<()> {
    writeln!(out, "{title}")?;
    writeln!(out, "Total Attempted Input: {}", stats.total_attempted)?;
    writeln!(out, "Total Accepted: {}", stats.total_accepted)?;
    writeln!(out, "Total Dropped: {}", stats.total_dropped)?;
    writeln!(out, "Total Sent (Smoothed Output): {}", stats.total_sent)?;
    writeln!(out, "Final Bucket Level: {}", stats.final_level)
}
