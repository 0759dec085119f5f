//! Core data models for trend analysis
//!
//! Input series, per-detector result records and the aggregate
//! `AnalysisResult` handed to reporters and the CI gate.

use crate::analysis::{AnalysisError, MetricCategory, Outcome, Sensitivity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single measurement of one metric in one snapshot.
///
/// `value == None` marks a missing or unparseable sample. It is excluded
/// from every computation but keeps its index so positions stay aligned
/// across metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub index: usize,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub value: Option<f64>,
}

impl Observation {
    pub fn new(index: usize, value: Option<f64>) -> Self {
        Self {
            index,
            timestamp: None,
            value,
        }
    }
}

/// Ordered observations of one named metric, oldest first.
///
/// Construction validates the series, so every `MetricSeries` in the
/// program has strictly increasing indices and only finite values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    name: String,
    observations: Vec<Observation>,
}

impl MetricSeries {
    pub fn new(
        name: impl Into<String>,
        observations: Vec<Observation>,
    ) -> Result<Self, AnalysisError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AnalysisError::InvalidInput {
                metric: name,
                reason: "metric name is empty".to_string(),
            });
        }

        for pair in observations.windows(2) {
            if pair[1].index <= pair[0].index {
                return Err(AnalysisError::InvalidInput {
                    metric: name,
                    reason: format!(
                        "indices must be strictly increasing (index {} follows {})",
                        pair[1].index, pair[0].index
                    ),
                });
            }
        }

        if let Some(bad) = observations
            .iter()
            .find(|o| o.value.is_some_and(|v| !v.is_finite()))
        {
            return Err(AnalysisError::InvalidInput {
                metric: name,
                reason: format!("non-finite value at index {}", bad.index),
            });
        }

        Ok(Self { name, observations })
    }

    /// Build a dense series (indices 0..n) from plain values.
    pub fn from_values(name: impl Into<String>, values: &[f64]) -> Result<Self, AnalysisError> {
        let observations = values
            .iter()
            .enumerate()
            .map(|(i, &v)| Observation::new(i, Some(v)))
            .collect();
        Self::new(name, observations)
    }

    /// Build a series where `None` entries are absent samples.
    pub fn from_optional(
        name: impl Into<String>,
        values: &[Option<f64>],
    ) -> Result<Self, AnalysisError> {
        let observations = values
            .iter()
            .enumerate()
            .map(|(i, &v)| Observation::new(i, v))
            .collect();
        Self::new(name, observations)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// `(index, value)` pairs of the present samples, in order.
    pub fn valid_points(&self) -> Vec<(usize, f64)> {
        self.observations
            .iter()
            .filter_map(|o| o.value.map(|v| (o.index, v)))
            .collect()
    }

    /// Present values only, in order.
    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().filter_map(|o| o.value).collect()
    }

    pub fn valid_len(&self) -> usize {
        self.observations.iter().filter(|o| o.value.is_some()).count()
    }

    pub fn first_value(&self) -> Option<f64> {
        self.observations.iter().find_map(|o| o.value)
    }

    pub fn last_value(&self) -> Option<f64> {
        self.observations.iter().rev().find_map(|o| o.value)
    }

    /// Last valid minus first valid value over the analyzed window.
    pub fn delta(&self) -> Option<f64> {
        match (self.first_value(), self.last_value()) {
            (Some(first), Some(last)) => Some(last - first),
            _ => None,
        }
    }
}

/// Direction of a trend or a shift
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increasing,
    Decreasing,
    Flat,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Increasing => write!(f, "increasing"),
            Direction::Decreasing => write!(f, "decreasing"),
            Direction::Flat => write!(f, "flat"),
        }
    }
}

/// Scale estimator behind an anomaly z-score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleEstimator {
    /// Median absolute deviation (the modified z-score)
    Mad,
    /// Mean absolute deviation, used when MAD collapses to zero
    MeanAbsoluteDeviation,
    /// Every value is identical: no anomaly is possible
    Degenerate,
}

/// Modified z-score verdict for one point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    pub metric: String,
    pub index: usize,
    pub value: f64,
    pub median: f64,
    pub z_score: f64,
    /// `median ± threshold * scale`, rounded for display
    pub typical_range: [f64; 2],
    pub is_anomaly: bool,
    pub estimator: ScaleEstimator,
}

/// Mann-Kendall significance test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MannKendall {
    pub s: i64,
    pub variance: f64,
    pub z: f64,
    pub p_value: f64,
    pub significant: bool,
}

/// Theil-Sen slope with optional Mann-Kendall significance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub metric: String,
    /// Change per snapshot
    pub slope: f64,
    pub direction: Direction,
    pub observations: usize,
    pub significance: Outcome<MannKendall>,
}

impl TrendResult {
    pub fn p_value(&self) -> Option<f64> {
        self.significance.computed().map(|mk| mk.p_value)
    }

    /// A trend counts as confirmed only when Mann-Kendall ran and passed.
    pub fn significant(&self) -> bool {
        self.significance.computed().is_some_and(|mk| mk.significant)
    }
}

/// Why a forecast does or does not produce a snapshot count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Reachable,
    AlreadyCrossed,
    FlatTrend,
    NotSignificant,
    NoTrend,
}

/// Threshold-crossing forecast for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub metric: String,
    pub target: f64,
    pub current: Option<f64>,
    pub slope: Option<f64>,
    pub snapshots_until: Option<u64>,
    pub reachable: bool,
    pub status: ForecastStatus,
}

/// Western Electric rule that produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternRule {
    /// Rule 1: a point beyond 3σ
    BeyondThreeSigma,
    /// Rule 2: two of three beyond 2σ, same side
    TwoOfThreeBeyondTwoSigma,
    /// Rule 3: four of five beyond 1σ, same side
    FourOfFiveBeyondOneSigma,
    /// Rule 4: a run of points on one side of the mean
    RunOnOneSide,
    /// Rule 4 cousin: a run of consecutive increases or decreases
    MonotonicRun,
}

impl PatternRule {
    pub fn rule_id(&self) -> u8 {
        match self {
            PatternRule::BeyondThreeSigma => 1,
            PatternRule::TwoOfThreeBeyondTwoSigma => 2,
            PatternRule::FourOfFiveBeyondOneSigma => 3,
            PatternRule::RunOnOneSide | PatternRule::MonotonicRun => 4,
        }
    }

    pub fn kind(&self) -> PatternKind {
        match self {
            PatternRule::BeyondThreeSigma
            | PatternRule::TwoOfThreeBeyondTwoSigma
            | PatternRule::FourOfFiveBeyondOneSigma => PatternKind::OutOfControl,
            PatternRule::RunOnOneSide | PatternRule::MonotonicRun => {
                PatternKind::SustainedDirection
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    OutOfControl,
    SustainedDirection,
}

/// A Western Electric rule violation over a window of the series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub metric: String,
    pub rule_id: u8,
    pub rule: PatternRule,
    pub kind: PatternKind,
    pub window_start: usize,
    pub window_end: usize,
    pub description: String,
}

/// CUSUM regime-shift verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeResult {
    pub metric: String,
    pub shift_detected: bool,
    pub shift_index: Option<usize>,
    pub direction: Direction,
    pub baseline_mean: f64,
    pub sigma: f64,
    pub decision_interval: f64,
}

/// Everything computed for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    pub metric: String,
    pub category: MetricCategory,
    pub observations: usize,
    pub first: Option<f64>,
    pub latest: Option<f64>,
    pub delta: Option<f64>,
    /// Present values in order, kept for sparklines
    pub values: Vec<f64>,
    pub anomaly: Outcome<AnomalyResult>,
    /// Earlier points that also cross the anomaly threshold
    pub past_anomalies: Vec<AnomalyResult>,
    pub trend: Outcome<TrendResult>,
    pub patterns: Outcome<Vec<PatternMatch>>,
    pub regime: Outcome<RegimeResult>,
    pub forecast: Option<ForecastResult>,
}

/// Overall direction of code health across all metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Stable,
    Degrading,
    Improving,
    Mixed,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Stable => write!(f, "stable"),
            Verdict::Degrading => write!(f, "degrading"),
            Verdict::Improving => write!(f, "improving"),
            Verdict::Mixed => write!(f, "mixed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub verdict: Verdict,
    pub anomaly_count: usize,
    /// Direction of the composite health trend, when one was computed
    pub trend_direction: Option<Direction>,
    pub metrics_analyzed: usize,
}

/// Comparison operator of an assertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparator::Le => "<=",
            Comparator::Ge => ">=",
            Comparator::Lt => "<",
            Comparator::Gt => ">",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        }
    }
}

/// Left-hand side of an assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "metric", rename_all = "snake_case")]
pub enum Selector {
    /// `<metric>`: latest raw value
    Latest(String),
    /// `delta_<metric>`: last minus first value
    Delta(String),
    /// `trend_<metric>`: signed Theil-Sen slope
    Trend(String),
}

impl Selector {
    pub fn metric(&self) -> &str {
        match self {
            Selector::Latest(m) | Selector::Delta(m) | Selector::Trend(m) => m,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Latest(m) => write!(f, "{}", m),
            Selector::Delta(m) => write!(f, "delta_{}", m),
            Selector::Trend(m) => write!(f, "trend_{}", m),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionExpression {
    pub selector: Selector,
    pub comparator: Comparator,
    pub rhs: f64,
}

impl std::fmt::Display for AssertionExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.selector, self.comparator.symbol(), self.rhs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionOutcome {
    pub expression: String,
    pub observed_value: Option<f64>,
    pub passed: bool,
}

/// State of the assertion subsystem for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssertionReport {
    NotRequested,
    Evaluated {
        outcomes: Vec<AssertionOutcome>,
        passed: bool,
    },
    /// The assertion string did not parse; nothing was evaluated
    Invalid { error: String },
}

impl AssertionReport {
    pub fn outcomes(&self) -> &[AssertionOutcome] {
        match self {
            AssertionReport::Evaluated { outcomes, .. } => outcomes,
            _ => &[],
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, AssertionReport::Invalid { .. })
    }
}

/// Unified result of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub sensitivity: Sensitivity,
    pub fail_on_anomaly: bool,
    pub summary: AnalysisSummary,
    pub metrics: Vec<MetricReport>,
    pub assertions: AssertionReport,
}

impl AnalysisResult {
    pub fn metric(&self, name: &str) -> Option<&MetricReport> {
        self.metrics.iter().find(|m| m.metric == name)
    }

    /// Latest-point anomalies that crossed the threshold
    pub fn anomalies(&self) -> Vec<&AnomalyResult> {
        self.metrics
            .iter()
            .filter_map(|m| m.anomaly.computed())
            .filter(|a| a.is_anomaly)
            .collect()
    }

    pub fn trends(&self) -> Vec<&TrendResult> {
        self.metrics.iter().filter_map(|m| m.trend.computed()).collect()
    }

    pub fn forecasts(&self) -> Vec<&ForecastResult> {
        self.metrics.iter().filter_map(|m| m.forecast.as_ref()).collect()
    }

    pub fn patterns(&self) -> Vec<&PatternMatch> {
        self.metrics
            .iter()
            .filter_map(|m| m.patterns.computed())
            .flatten()
            .collect()
    }

    pub fn regimes(&self) -> Vec<&RegimeResult> {
        self.metrics.iter().filter_map(|m| m.regime.computed()).collect()
    }

    /// The CI gate: fails on a false assertion, an unparseable assertion
    /// string, or any anomaly when `fail_on_anomaly` is set.
    pub fn should_fail_ci(&self) -> bool {
        let assertion_failed = match &self.assertions {
            AssertionReport::NotRequested => false,
            AssertionReport::Evaluated { passed, .. } => !passed,
            AssertionReport::Invalid { .. } => true,
        };
        assertion_failed || (self.fail_on_anomaly && self.summary.anomaly_count > 0)
    }
}
