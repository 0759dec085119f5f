//! Text (terminal) reporter with colors and sparklines

use crate::analysis::Outcome;
use crate::models::{
    AnalysisResult, AssertionReport, Direction, ForecastStatus, MetricReport, PatternKind,
    TrendResult, Verdict,
};
use anyhow::Result;

/// Reset ANSI color
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";

const SPARK_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const SPARK_WIDTH: usize = 24;

fn verdict_color(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Stable => GREEN,
        Verdict::Improving => GREEN,
        Verdict::Mixed => YELLOW,
        Verdict::Degrading => RED,
    }
}

/// Unicode sparkline of the newest values, scaled to their own range
fn sparkline(values: &[f64]) -> String {
    let tail = &values[values.len().saturating_sub(SPARK_WIDTH)..];
    let min = tail.iter().copied().fold(f64::INFINITY, f64::min);
    let max = tail.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    tail.iter()
        .map(|&v| {
            if span <= 0.0 {
                SPARK_CHARS[0]
            } else {
                let level = ((v - min) / span * 7.0).round() as usize;
                SPARK_CHARS[level.min(7)]
            }
        })
        .collect()
}

fn format_number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e12 => format!("{:.0}", v),
        Some(v) => format!("{:.2}", v),
        None => "-".to_string(),
    }
}

fn format_delta(value: Option<f64>) -> String {
    match value {
        Some(v) if v > 0.0 => format!("+{}", format_number(Some(v))),
        other => format_number(other),
    }
}

fn trend_cell(report: &MetricReport) -> String {
    match &report.trend {
        Outcome::Computed(t) => {
            let arrow = match t.direction {
                Direction::Increasing => "↑",
                Direction::Decreasing => "↓",
                Direction::Flat => "→",
            };
            let color = trend_color(report, t);
            let p = t
                .p_value()
                .map(|p| format!("p={:.3}", p))
                .unwrap_or_else(|| "p=n/a".to_string());
            format!("{color}{arrow} {:+.2}/snap{RESET} {DIM}{}{RESET}", t.slope, p)
        }
        Outcome::Skipped(_) => format!("{DIM}insufficient data{RESET}"),
    }
}

/// Red for a significant move in the bad direction, green for the good one
fn trend_color(report: &MetricReport, trend: &TrendResult) -> &'static str {
    if !trend.significant() {
        return DIM;
    }
    match (report.category.higher_is_better(), trend.direction) {
        (Some(true), Direction::Increasing) | (Some(false), Direction::Decreasing) => GREEN,
        (Some(true), Direction::Decreasing) | (Some(false), Direction::Increasing) => RED,
        _ => "",
    }
}

/// Render report as formatted terminal output
pub fn render(result: &AnalysisResult) -> Result<String> {
    let mut out = String::new();
    let summary = &result.summary;

    // Header
    let vc = verdict_color(summary.verdict);
    out.push_str(&format!("\n{BOLD}Repotoire Trend Analysis{RESET}\n"));
    out.push_str(&format!(
        "{DIM}──────────────────────────────────────{RESET}\n"
    ));
    out.push_str(&format!(
        "Verdict: {vc}{BOLD}{}{RESET}  Metrics: {}  Anomalies: {}  Sensitivity: {}\n\n",
        summary.verdict.to_string().to_uppercase(),
        summary.metrics_analyzed,
        summary.anomaly_count,
        result.sensitivity
    ));

    if result.metrics.is_empty() {
        out.push_str(&format!("{DIM}No metrics in history.{RESET}\n"));
        return Ok(out);
    }

    // Metrics table
    out.push_str(&format!("{BOLD}METRICS{RESET}\n"));
    out.push_str(&format!(
        "{DIM}  METRIC                 LATEST     DELTA  HISTORY                   TREND{RESET}\n"
    ));
    for m in &result.metrics {
        let name: String = m.metric.chars().take(20).collect();
        out.push_str(&format!(
            "  {:<20} {:>8} {:>9}  {:<24}  {}\n",
            name,
            format_number(m.latest),
            format_delta(m.delta),
            sparkline(&m.values),
            trend_cell(m)
        ));
    }
    out.push('\n');

    // Anomalies
    let anomalies = result.anomalies();
    if !anomalies.is_empty() {
        out.push_str(&format!("{BOLD}ANOMALIES{RESET}\n"));
        for a in anomalies {
            out.push_str(&format!(
                "  {RED}!{RESET} {}: {} (z={:.1}, typical {}..{})\n",
                a.metric,
                format_number(Some(a.value)),
                a.z_score,
                a.typical_range[0],
                a.typical_range[1]
            ));
        }
        out.push('\n');
    }

    // Patterns and regime shifts
    let patterns = result.patterns();
    let shifts: Vec<_> = result.regimes().into_iter().filter(|r| r.shift_detected).collect();
    let outliers: Vec<&MetricReport> = result
        .metrics
        .iter()
        .filter(|m| !m.past_anomalies.is_empty())
        .collect();
    if !patterns.is_empty() || !shifts.is_empty() || !outliers.is_empty() {
        out.push_str(&format!("{BOLD}SIGNALS{RESET}\n"));
        for p in patterns {
            let tag = match p.kind {
                PatternKind::OutOfControl => format!("{RED}[R{}]{RESET}", p.rule_id),
                PatternKind::SustainedDirection => format!("{YELLOW}[R{}]{RESET}", p.rule_id),
            };
            out.push_str(&format!(
                "  {} {}: {} {DIM}(snapshots {}-{}){RESET}\n",
                tag, p.metric, p.description, p.window_start, p.window_end
            ));
        }
        for m in outliers {
            let indices: Vec<String> =
                m.past_anomalies.iter().map(|a| a.index.to_string()).collect();
            out.push_str(&format!(
                "  {DIM}[MAD]{RESET} {}: earlier outliers at snapshots {}\n",
                m.metric,
                indices.join(", ")
            ));
        }
        for r in shifts {
            if let Some(index) = r.shift_index {
                out.push_str(&format!(
                    "  {YELLOW}[CUSUM]{RESET} {}: {} shift at snapshot {} (baseline {:.2})\n",
                    r.metric, r.direction, index, r.baseline_mean
                ));
            }
        }
        out.push('\n');
    }

    // Forecasts
    let forecasts = result.forecasts();
    if !forecasts.is_empty() {
        out.push_str(&format!("{BOLD}FORECASTS{RESET}\n"));
        for f in forecasts {
            let detail = match (f.status, f.snapshots_until) {
                (ForecastStatus::Reachable, Some(n)) => format!(
                    "{YELLOW}reaches {} in ~{} snapshots{RESET}",
                    format_number(Some(f.target)),
                    n
                ),
                (ForecastStatus::AlreadyCrossed, _) => {
                    format!("{RED}already at or past {}{RESET}", format_number(Some(f.target)))
                }
                (ForecastStatus::FlatTrend, _) => format!("{DIM}flat, target not reached{RESET}"),
                (ForecastStatus::NotSignificant, _) => {
                    format!("{DIM}trend not significant{RESET}")
                }
                _ => format!("{DIM}no trend available{RESET}"),
            };
            out.push_str(&format!("  {}: {}\n", f.metric, detail));
        }
        out.push('\n');
    }

    // Assertions
    match &result.assertions {
        AssertionReport::NotRequested => {}
        AssertionReport::Invalid { error } => {
            out.push_str(&format!("{BOLD}ASSERTIONS{RESET}\n"));
            out.push_str(&format!("  {RED}invalid:{RESET} {}\n\n", error));
        }
        AssertionReport::Evaluated { outcomes, passed } => {
            out.push_str(&format!("{BOLD}ASSERTIONS{RESET}\n"));
            for o in outcomes {
                let mark = if o.passed {
                    format!("{GREEN}PASS{RESET}")
                } else {
                    format!("{RED}FAIL{RESET}")
                };
                out.push_str(&format!(
                    "  {} {} {DIM}(observed {}){RESET}\n",
                    mark,
                    o.expression,
                    format_number(o.observed_value)
                ));
            }
            let overall = if *passed {
                format!("{GREEN}all assertions passed{RESET}")
            } else {
                format!("{RED}assertions failed{RESET}")
            };
            out.push_str(&format!("  {}\n\n", overall));
        }
    }

    if result.should_fail_ci() {
        out.push_str(&format!("{RED}{BOLD}CI gate: FAIL{RESET}\n"));
    } else if !matches!(result.assertions, AssertionReport::NotRequested)
        || result.fail_on_anomaly
    {
        out.push_str(&format!("{GREEN}{BOLD}CI gate: PASS{RESET}\n"));
    }

    Ok(out)
}
