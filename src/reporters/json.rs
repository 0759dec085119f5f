//! JSON reporter
//!
//! Flattens the AnalysisResult into the CI-facing shape: summary, then one
//! array per finding kind, then assertion outcomes and the gate decision.
//! Per-metric skip reasons are listed so consumers can tell "no trend"
//! apart from "not enough data".

use crate::analysis::{Sensitivity, SkipReason};
use crate::models::{
    AnalysisResult, AnalysisSummary, AnomalyResult, AssertionReport, Direction, ForecastResult,
    PatternMatch, RegimeResult,
};
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
struct TrendView<'a> {
    metric: &'a str,
    slope: f64,
    p_value: Option<f64>,
    direction: Direction,
    significant: bool,
    observations: usize,
}

#[derive(Serialize)]
struct SkipView<'a> {
    metric: &'a str,
    detector: &'static str,
    reason: &'a SkipReason,
}

#[derive(Serialize)]
struct ReportView<'a> {
    sensitivity: Sensitivity,
    summary: &'a AnalysisSummary,
    anomalies: Vec<&'a AnomalyResult>,
    trends: Vec<TrendView<'a>>,
    forecasts: Vec<&'a ForecastResult>,
    patterns: Vec<&'a PatternMatch>,
    regimes: Vec<&'a RegimeResult>,
    assertions: &'a AssertionReport,
    skipped: Vec<SkipView<'a>>,
    should_fail_ci: bool,
}

fn view(result: &AnalysisResult) -> ReportView<'_> {
    let trends = result
        .trends()
        .into_iter()
        .map(|t| TrendView {
            metric: &t.metric,
            slope: t.slope,
            p_value: t.p_value(),
            direction: t.direction,
            significant: t.significant(),
            observations: t.observations,
        })
        .collect();

    let mut skipped = Vec::new();
    for m in &result.metrics {
        let reasons = [
            ("anomaly", m.anomaly.skip_reason()),
            ("trend", m.trend.skip_reason()),
            ("patterns", m.patterns.skip_reason()),
            ("regime", m.regime.skip_reason()),
        ];
        for (detector, reason) in reasons {
            // Category exclusions are configuration, not missing data
            if let Some(reason) = reason.filter(|r| !matches!(r, SkipReason::NotApplicable { .. }))
            {
                skipped.push(SkipView {
                    metric: &m.metric,
                    detector,
                    reason,
                });
            }
        }
    }

    ReportView {
        sensitivity: result.sensitivity,
        summary: &result.summary,
        anomalies: result.anomalies(),
        trends,
        forecasts: result.forecasts(),
        patterns: result.patterns(),
        regimes: result.regimes(),
        assertions: &result.assertions,
        skipped,
        should_fail_ci: result.should_fail_ci(),
    }
}

/// Render report as JSON
pub fn render(result: &AnalysisResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(&view(result))?)
}
