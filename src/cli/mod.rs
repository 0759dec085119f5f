//! CLI command definitions and handlers

mod init;
mod trends;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a forecast target of the form `metric=value`
fn parse_target(s: &str) -> Result<(String, f64), String> {
    let (metric, value) = s
        .split_once('=')
        .ok_or_else(|| format!("'{}' is not of the form metric=value", s))?;
    let metric = metric.trim();
    if metric.is_empty() {
        return Err(format!("'{}' has an empty metric name", s));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", value.trim()))?;
    if !value.is_finite() {
        return Err(format!("target for '{}' must be finite", metric));
    }
    Ok((metric.to_string(), value))
}

/// Parse and validate a snapshot window (at least 1)
fn parse_last(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("--last must be at least 1".to_string())
    } else {
        Ok(n)
    }
}

/// Repotoire Trends - statistical analysis of code-health snapshot history
#[derive(Parser, Debug)]
#[command(name = "repotoire-trends")]
#[command(
    version,
    about = "Anomalies, trends, early-warning patterns and forecasts over code-health snapshots",
    long_about = "Repotoire Trends reads a history of periodic code-health snapshots \
(file and symbol counts, cycles, dead exports, violations, health score) and reports \
whether the latest values are anomalous, which metrics are trending with statistical \
significance, and when a metric will cross a target at its current rate.\n\n\
Assertions turn the analysis into a CI gate: the process exits 1 when one fails.",
    after_help = "\
Examples:
  repotoire-trends analyze history.json                           Text report
  repotoire-trends analyze history.json --format json             JSON for scripting
  repotoire-trends analyze history.json --assert 'delta_cycles<=2,trend_cycles<=0'
  repotoire-trends analyze history.json --target health_score=60  Forecast a threshold
  repotoire-trends init                                           Write a [trends] config section"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(
        long,
        global = true,
        default_value = "warn",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a snapshot history file
    #[command(after_help = "\
Examples:
  repotoire-trends analyze history.json --sensitivity high
  repotoire-trends analyze history.json --last 30 --fail-on-anomaly
  repotoire-trends analyze history.json --format json -o trends.json
  repotoire-trends analyze history.json --path ../repo    Use ../repo/repotoire.toml

Exit status: 0 pass, 1 CI gate failed, 2 invalid assertion expression")]
    Analyze {
        /// Snapshot history (JSON array of snapshot objects)
        history: PathBuf,

        /// Repository root holding repotoire.toml
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Detector sensitivity (overrides config)
        #[arg(long, value_parser = ["low", "medium", "high"])]
        sensitivity: Option<String>,

        /// Comma-separated assertions, e.g. 'delta_cycles<=2,trend_cycles<=0'
        #[arg(long = "assert")]
        assertions: Option<String>,

        /// Fail the CI gate when the latest value of any metric is anomalous
        #[arg(long)]
        fail_on_anomaly: bool,

        /// Forecast target, repeatable: --target health_score=60
        #[arg(long = "target", value_parser = parse_target)]
        targets: Vec<(String, f64)>,

        /// Analyze only the newest N snapshots
        #[arg(long, value_parser = parse_last)]
        last: Option<usize>,

        /// Report every control-chart pattern, not just the earliest
        #[arg(long)]
        all_patterns: bool,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Add an example [trends] section to repotoire.toml
    Init {
        /// Repository root (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { path } => init::run(&path),

        Commands::Analyze {
            history,
            path,
            sensitivity,
            assertions,
            fail_on_anomaly,
            targets,
            last,
            all_patterns,
            format,
            output,
        } => trends::run(trends::AnalyzeArgs {
            history,
            repo_path: path,
            sensitivity,
            assertions,
            fail_on_anomaly,
            targets,
            last,
            all_patterns,
            format,
            output,
        }),
    }
}
