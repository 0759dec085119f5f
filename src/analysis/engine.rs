//! Analysis orchestrator
//!
//! Classifies each metric, runs the detectors that apply to its category,
//! evaluates assertions over the assembled reports and derives the overall
//! verdict. Metrics are independent, so they are analyzed in parallel and
//! collected back in name order; the output does not depend on scheduling.

use crate::analysis::patterns::ScanMode;
use crate::analysis::{
    anomaly, evaluate_assertions, forecast, parse_assertions, patterns, regime, trend,
    AnalysisError, MetricCategory, MetricClassifier, Outcome, Sensitivity, SensitivityProfile,
    SkipReason,
};
use crate::models::{
    AnalysisResult, AnalysisSummary, AssertionReport, Direction, MetricReport, MetricSeries,
    Verdict,
};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Caller-supplied knobs for one analysis run
#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    pub sensitivity: Sensitivity,
    /// Forecast targets keyed by metric name
    pub targets: BTreeMap<String, f64>,
    /// Comma-separated assertion list, e.g. `delta_cycles<=2,trend_cycles<=0`
    pub assertions: Option<String>,
    pub fail_on_anomaly: bool,
    pub category_overrides: BTreeMap<String, MetricCategory>,
    /// Fixed CUSUM baseline instead of the first-half mean
    pub regime_baseline: Option<f64>,
    pub pattern_mode: ScanMode,
}

fn log_skip<T>(metric: &str, detector: &str, outcome: &Outcome<T>) {
    if let Some(reason) = outcome.skip_reason() {
        debug!("{}: {} skipped ({})", metric, detector, reason);
    }
}

fn analyze_metric(
    series: &MetricSeries,
    category: MetricCategory,
    profile: &SensitivityProfile,
    options: &AnalysisOptions,
) -> MetricReport {
    let name = series.name();

    let anomaly = anomaly::detect(series, profile);
    let latest_index = anomaly.computed().map(|a| a.index);
    let past_anomalies = match anomaly::scan(series, profile) {
        Outcome::Computed(found) => found
            .into_iter()
            .filter(|a| Some(a.index) != latest_index)
            .collect(),
        Outcome::Skipped(_) => Vec::new(),
    };
    let trend = trend::estimate(series, profile);

    let patterns = if category.runs_patterns() {
        patterns::detect(series, profile, options.pattern_mode)
    } else {
        Outcome::Skipped(SkipReason::not_applicable(format!(
            "{} metrics are not pattern-checked",
            category
        )))
    };

    let regime = if category.runs_regime() {
        regime::detect(series, profile, options.regime_baseline)
    } else {
        Outcome::Skipped(SkipReason::not_applicable(
            "regime detection only runs on composite metrics",
        ))
    };

    let forecast = options
        .targets
        .get(name)
        .map(|&target| forecast::forecast(name, &trend, series.last_value(), target));

    log_skip(name, "anomaly", &anomaly);
    log_skip(name, "trend", &trend);
    log_skip(name, "patterns", &patterns);
    log_skip(name, "regime", &regime);

    MetricReport {
        metric: name.to_string(),
        category,
        observations: series.valid_len(),
        first: series.first_value(),
        latest: series.last_value(),
        delta: series.delta(),
        values: series.values(),
        anomaly,
        past_anomalies,
        trend,
        patterns,
        regime,
        forecast,
    }
}

/// Good (`true`) or bad (`false`) news from one directional signal.
fn judge(category: MetricCategory, direction: Direction) -> Option<bool> {
    let higher_is_better = category.higher_is_better()?;
    match direction {
        Direction::Increasing => Some(higher_is_better),
        Direction::Decreasing => Some(!higher_is_better),
        Direction::Flat => None,
    }
}

fn verdict(reports: &[MetricReport]) -> Verdict {
    let mut degrading = false;
    let mut improving = false;

    for report in reports {
        let trend_signal = report
            .trend
            .computed()
            .filter(|t| t.significant())
            .and_then(|t| judge(report.category, t.direction));
        let regime_signal = report
            .regime
            .computed()
            .filter(|r| r.shift_detected)
            .and_then(|r| judge(report.category, r.direction));

        for good in [trend_signal, regime_signal].into_iter().flatten() {
            if good {
                improving = true;
            } else {
                degrading = true;
            }
        }
    }

    match (degrading, improving) {
        (true, true) => Verdict::Mixed,
        (true, false) => Verdict::Degrading,
        (false, true) => Verdict::Improving,
        (false, false) => Verdict::Stable,
    }
}

fn assertion_report(assertions: Option<&str>, reports: &[MetricReport]) -> AssertionReport {
    let Some(input) = assertions else {
        return AssertionReport::NotRequested;
    };

    let names: Vec<String> = reports.iter().map(|r| r.metric.clone()).collect();
    match parse_assertions(input, &names) {
        Ok(expressions) => {
            let outcomes = evaluate_assertions(&expressions, reports);
            let passed = outcomes.iter().all(|o| o.passed);
            for outcome in outcomes.iter().filter(|o| !o.passed) {
                debug!(
                    "Assertion failed: {} (observed {:?})",
                    outcome.expression, outcome.observed_value
                );
            }
            AssertionReport::Evaluated { outcomes, passed }
        }
        Err(e) => {
            warn!("Assertions not evaluated: {}", e);
            AssertionReport::Invalid {
                error: e.to_string(),
            }
        }
    }
}

/// Analyze a set of metric series.
///
/// Only a metric supplied twice is an error here; series are validated on
/// construction and every per-detector problem becomes `Outcome::Skipped`.
pub fn analyze(
    series: &[MetricSeries],
    options: &AnalysisOptions,
) -> Result<AnalysisResult, AnalysisError> {
    let mut seen = BTreeSet::new();
    for s in series {
        if !seen.insert(s.name()) {
            return Err(AnalysisError::DuplicateMetric(s.name().to_string()));
        }
    }

    let mut ordered: Vec<&MetricSeries> = series.iter().collect();
    ordered.sort_by(|a, b| a.name().cmp(b.name()));

    let profile = options.sensitivity.profile();
    let classifier = MetricClassifier::with_overrides(&options.category_overrides);

    for target in options.targets.keys() {
        if !seen.contains(target.as_str()) {
            warn!("Forecast target for unknown metric '{}' ignored", target);
        }
    }

    let reports: Vec<MetricReport> = ordered
        .par_iter()
        .map(|s| analyze_metric(s, classifier.classify(s.name()), &profile, options))
        .collect();

    let anomaly_count = reports
        .iter()
        .filter_map(|r| r.anomaly.computed())
        .filter(|a| a.is_anomaly)
        .count();

    let trend_direction = reports
        .iter()
        .filter(|r| r.category == MetricCategory::Composite)
        .find_map(|r| r.trend.computed().map(|t| t.direction));

    let assertions = assertion_report(options.assertions.as_deref(), &reports);

    let summary = AnalysisSummary {
        verdict: verdict(&reports),
        anomaly_count,
        trend_direction,
        metrics_analyzed: reports.len(),
    };

    info!(
        "Analyzed {} metrics at {} sensitivity: {} ({} anomalies)",
        summary.metrics_analyzed, options.sensitivity, summary.verdict, summary.anomaly_count
    );

    Ok(AnalysisResult {
        sensitivity: options.sensitivity,
        fail_on_anomaly: options.fail_on_anomaly,
        summary,
        metrics: reports,
        assertions,
    })
}
