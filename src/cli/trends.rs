//! Analyze command - run the trend analysis over a snapshot history

use anyhow::{Context, Result};
use console::style;
use repotoire_trends::analysis::patterns::ScanMode;
use repotoire_trends::analysis::{analyze, AnalysisOptions, Sensitivity};
use repotoire_trends::config::{load_project_config, TrendsConfig};
use repotoire_trends::history::load_history;
use repotoire_trends::models::{AnalysisResult, AssertionReport};
use repotoire_trends::reporters::{report_with_format, OutputFormat};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Exit status when the CI gate fails
pub const EXIT_GATE_FAILED: i32 = 1;
/// Exit status when the assertion string does not parse
pub const EXIT_INVALID_ASSERTION: i32 = 2;

/// Window applied when none is configured; Theil-Sen keeps n² / 2 slopes
pub const DEFAULT_MAX_SNAPSHOTS: usize = 1000;

pub struct AnalyzeArgs {
    pub history: PathBuf,
    pub repo_path: PathBuf,
    pub sensitivity: Option<String>,
    pub assertions: Option<String>,
    pub fail_on_anomaly: bool,
    pub targets: Vec<(String, f64)>,
    pub last: Option<usize>,
    pub all_patterns: bool,
    pub format: String,
    pub output: Option<PathBuf>,
}

/// Layer CLI flags over the `[trends]` config section.
fn resolve_options(config: &TrendsConfig, args: &AnalyzeArgs) -> Result<AnalysisOptions> {
    let mut options = config.analysis_options();

    if let Some(ref level) = args.sensitivity {
        options.sensitivity = Sensitivity::from_str(level)?;
    }
    if let Some(ref assertions) = args.assertions {
        options.assertions = Some(assertions.clone());
    }
    if args.fail_on_anomaly {
        options.fail_on_anomaly = true;
    }
    options.targets.extend(args.targets.iter().cloned());
    if args.all_patterns {
        options.pattern_mode = ScanMode::Exhaustive;
    }

    Ok(options)
}

/// Snapshot window to analyze: an explicit `--last`/config value, or the
/// default cap when the history is larger than it
fn snapshot_window(total: usize, requested: Option<usize>) -> Option<usize> {
    match requested {
        Some(n) => Some(n),
        None if total > DEFAULT_MAX_SNAPSHOTS => {
            warn!(
                "History has {} snapshots; analyzing the newest {} (use --last to change)",
                total, DEFAULT_MAX_SNAPSHOTS
            );
            Some(DEFAULT_MAX_SNAPSHOTS)
        }
        None => None,
    }
}

/// Exit status for the CI gate, `None` when it passes
fn gate_exit_code(result: &AnalysisResult) -> Option<i32> {
    if result.assertions.is_invalid() {
        Some(EXIT_INVALID_ASSERTION)
    } else if result.should_fail_ci() {
        Some(EXIT_GATE_FAILED)
    } else {
        None
    }
}

/// Run the analyze command
pub fn run(args: AnalyzeArgs) -> Result<()> {
    let format = OutputFormat::from_str(&args.format)?;
    let config = load_project_config(&args.repo_path);
    let options = resolve_options(&config.trends, &args)?;

    let history = load_history(&args.history)
        .with_context(|| format!("Failed to load history from {}", args.history.display()))?;
    let history = match snapshot_window(history.len(), args.last.or(config.trends.last)) {
        Some(n) => {
            debug!("Analyzing the newest {} of {} snapshots", n, history.len());
            history.window_last(n)
        }
        None => history,
    };

    let series = history.to_series()?;
    let result = analyze(&series, &options)?;
    let rendered = report_with_format(&result, format)?;

    if let Some(ref out_path) = args.output {
        std::fs::write(out_path, &rendered)
            .with_context(|| format!("Failed to write report to {}", out_path.display()))?;
        // stderr keeps stdout clean for piping
        eprintln!(
            "Report written to: {}",
            style(out_path.display()).cyan()
        );
    } else {
        print!("{}", rendered);
    }

    info!(
        "Analysis of {} snapshots complete: {}",
        history.len(),
        result.summary.verdict
    );

    if let Some(code) = gate_exit_code(&result) {
        match &result.assertions {
            AssertionReport::Invalid { error } => {
                eprintln!("{} {}", style("Invalid assertion:").red().bold(), error);
            }
            _ => eprintln!("{}", style("CI gate failed").red().bold()),
        }
        std::process::exit(code);
    }

    Ok(())
}
