//! Statistical analysis engine for snapshot histories
//!
//! Every detector is a pure function of a `MetricSeries` and a
//! `SensitivityProfile`:
//!
//! - `classifier` - metric name to category (growth, quality, composite)
//! - `anomaly` - modified z-score (MAD) on the latest point
//! - `trend` - Theil-Sen slope with Mann-Kendall significance
//! - `patterns` - Western Electric control-chart rules
//! - `regime` - two-sided CUSUM on composite metrics
//! - `forecast` - snapshots until a target is crossed
//! - `assertions` - CI gate expressions over the results
//! - `engine` - runs all of the above and assembles `AnalysisResult`
//!
//! Detectors never fail the batch. Too few points or a zero spread yields
//! `Outcome::Skipped` with a `SkipReason`, so callers can tell "no trend"
//! apart from "could not compute".

pub mod anomaly;
pub mod assertions;
pub mod classifier;
pub mod engine;
pub mod forecast;
pub mod patterns;
pub mod regime;
pub mod sensitivity;
pub mod stats;
pub mod trend;

pub use assertions::{evaluate_assertions, parse_assertions, AssertionError};
pub use classifier::{classify, MetricCategory, MetricClassifier};
pub use engine::{analyze, AnalysisOptions};
pub use sensitivity::{Sensitivity, SensitivityProfile};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal input errors, raised before any detector runs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Invalid input for metric '{metric}': {reason}")]
    InvalidInput { metric: String, reason: String },

    #[error("Metric '{0}' was supplied more than once")]
    DuplicateMetric(String),
}

/// Why a detector produced no result for a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Fewer valid observations than the algorithm needs
    InsufficientData { required: usize, available: usize },
    /// Zero spread where the algorithm needs one
    DegenerateInput { detail: String },
    /// The detector does not apply to this metric
    NotApplicable { detail: String },
}

impl SkipReason {
    pub fn insufficient(required: usize, available: usize) -> Self {
        SkipReason::InsufficientData {
            required,
            available,
        }
    }

    pub fn degenerate(detail: impl Into<String>) -> Self {
        SkipReason::DegenerateInput {
            detail: detail.into(),
        }
    }

    pub fn not_applicable(detail: impl Into<String>) -> Self {
        SkipReason::NotApplicable {
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::InsufficientData {
                required,
                available,
            } => write!(
                f,
                "insufficient data ({} of {} observations)",
                available, required
            ),
            SkipReason::DegenerateInput { detail } => write!(f, "degenerate input: {}", detail),
            SkipReason::NotApplicable { detail } => write!(f, "not applicable: {}", detail),
        }
    }
}

/// Per-detector result: either computed, or skipped with a reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome<T> {
    Computed(T),
    Skipped(SkipReason),
}

impl<T> Outcome<T> {
    pub fn computed(&self) -> Option<&T> {
        match self {
            Outcome::Computed(v) => Some(v),
            Outcome::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Outcome::Computed(_) => None,
            Outcome::Skipped(reason) => Some(reason),
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Outcome::Computed(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Computed(v) => Outcome::Computed(f(v)),
            Outcome::Skipped(reason) => Outcome::Skipped(reason),
        }
    }
}
