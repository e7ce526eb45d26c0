#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

//! Leaky-bucket traffic shaper.
//!
//! A bounded bucket absorbs bursty arrivals and releases them at a fixed
//! rate, dropping whatever does not fit. [`simulator`] drives it tick by
//! tick, [`limiter`] runs it live behind a timer, and [`report`] renders the
//! results.

pub mod bucket;
pub mod config;
pub mod error;
pub mod limiter;
pub mod report;
pub mod simulator;
pub mod stats;
pub mod supply;
pub mod telemetry;

pub type Result<T> = std::result::Result<T, error::Error>;
