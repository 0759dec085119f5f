//! Metric classifier
//!
//! Maps a metric name to the category that decides which detectors run:
//! growth metrics (files, symbols) drift upward as a project grows and are
//! neutral for the verdict; quality metrics (cycles, dead exports,
//! violations) are better when lower; composite metrics (the health score)
//! are better when higher and are the only ones watched for regime shifts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    Growth,
    Quality,
    Composite,
}

impl MetricCategory {
    /// Western Electric rules on a growing codebase would fire on every run
    pub fn runs_patterns(&self) -> bool {
        !matches!(self, MetricCategory::Growth)
    }

    pub fn runs_regime(&self) -> bool {
        matches!(self, MetricCategory::Composite)
    }

    /// Whether an increase in this metric is good news (`None` = neutral)
    pub fn higher_is_better(&self) -> Option<bool> {
        match self {
            MetricCategory::Growth => None,
            MetricCategory::Quality => Some(false),
            MetricCategory::Composite => Some(true),
        }
    }
}

impl std::fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricCategory::Growth => write!(f, "growth"),
            MetricCategory::Quality => write!(f, "quality"),
            MetricCategory::Composite => write!(f, "composite"),
        }
    }
}

const GROWTH_METRICS: &[&str] = &[
    "files",
    "symbols",
    "functions",
    "classes",
    "modules",
    "edges",
    "loc",
    "lines",
    "total_files",
    "total_functions",
    "total_classes",
    "total_loc",
];

const COMPOSITE_METRICS: &[&str] = &[
    "health_score",
    "health",
    "score",
    "overall_score",
    "structure_score",
    "quality_score",
    "architecture_score",
];

fn normalize(name: &str) -> String {
    name.trim().to_lowercase().replace('-', "_")
}

/// Built-in lookup. Unknown names are treated as quality metrics.
pub fn classify(metric_name: &str) -> MetricCategory {
    let key = normalize(metric_name);
    if COMPOSITE_METRICS.contains(&key.as_str()) {
        MetricCategory::Composite
    } else if GROWTH_METRICS.contains(&key.as_str()) {
        MetricCategory::Growth
    } else {
        MetricCategory::Quality
    }
}

/// Built-in table plus per-project overrides from configuration
#[derive(Debug, Clone, Default)]
pub struct MetricClassifier {
    overrides: BTreeMap<String, MetricCategory>,
}

impl MetricClassifier {
    pub fn with_overrides(overrides: &BTreeMap<String, MetricCategory>) -> Self {
        Self {
            overrides: overrides
                .iter()
                .map(|(name, cat)| (normalize(name), *cat))
                .collect(),
        }
    }

    pub fn classify(&self, metric_name: &str) -> MetricCategory {
        self.overrides
            .get(&normalize(metric_name))
            .copied()
            .unwrap_or_else(|| classify(metric_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        assert_eq!(classify("files"), MetricCategory::Growth);
        assert_eq!(classify("symbols"), MetricCategory::Growth);
        assert_eq!(classify("cycles"), MetricCategory::Quality);
        assert_eq!(classify("dead_exports"), MetricCategory::Quality);
        assert_eq!(classify("violations"), MetricCategory::Quality);
        assert_eq!(classify("health_score"), MetricCategory::Composite);
    }

    #[test]
    fn test_unknown_defaults_to_quality() {
        assert_eq!(classify("flaky_tests"), MetricCategory::Quality);
    }

    #[test]
    fn test_lookup_normalizes_case_and_dashes() {
        assert_eq!(classify("Health-Score"), MetricCategory::Composite);
        assert_eq!(classify(" FILES "), MetricCategory::Growth);
    }

    #[test]
    fn test_overrides_take_priority() {
        let mut overrides = BTreeMap::new();
        overrides.insert("files".to_string(), MetricCategory::Quality);
        overrides.insert("coverage-pct".to_string(), MetricCategory::Composite);
        let classifier = MetricClassifier::with_overrides(&overrides);
        assert_eq!(classifier.classify("files"), MetricCategory::Quality);
        assert_eq!(classifier.classify("coverage_pct"), MetricCategory::Composite);
        assert_eq!(classifier.classify("symbols"), MetricCategory::Growth);
    }

    #[test]
    fn test_detector_applicability() {
        assert!(!MetricCategory::Growth.runs_patterns());
        assert!(MetricCategory::Quality.runs_patterns());
        assert!(MetricCategory::Composite.runs_regime());
        assert!(!MetricCategory::Quality.runs_regime());
    }
}
