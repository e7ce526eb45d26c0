use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InvalidConfiguration(#[from] ConfigError),
    #[error("tick {tick}: arrival volume must be non-negative, got {volume}")]
    InvalidInput { tick: u64, volume: i64 },
    #[error("arrival supply exhausted before tick {tick}")]
    ExhaustedSupply { tick: u64 },
    #[error("tick {tick}: offer of {volume} would overflow the interval counters")]
    CounterOverflow { tick: u64, volume: i64 },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("failed to encode report")]
    Report(#[from] serde_json::Error),
    #[error("failed to write report")]
    Io(#[from] std::io::Error),
    #[error("background task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    #[error("invalid configuration for {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
    #[error("configuration error: {0}")]
    Other(String),
}

impl Error {
    /// Whether the run can keep going after this error.
    ///
    /// Rejected or unaccountable input only spoils its own tick and exhaustion
    /// is how bounded supplies end; everything else aborts the run.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::ExhaustedSupply { .. }
                | Self::CounterOverflow { .. }
        )
    }
}
