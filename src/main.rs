//! Repotoire Trends - time-series analysis of code-health snapshots
//!
//! Reads a snapshot history and reports anomalies, significant trends,
//! early-warning patterns, regime shifts and threshold forecasts, with
//! assertion-driven CI gating.

mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // Logs go to stderr so JSON on stdout stays parseable
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli::run(cli)
}
