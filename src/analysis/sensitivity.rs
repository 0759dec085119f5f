//! Sensitivity profiles: named bundles of detector thresholds

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Named sensitivity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    pub fn profile(self) -> SensitivityProfile {
        SensitivityProfile::for_level(self)
    }
}

impl FromStr for Sensitivity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Sensitivity::Low),
            "medium" | "med" => Ok(Sensitivity::Medium),
            "high" => Ok(Sensitivity::High),
            _ => Err(anyhow!(
                "Unknown sensitivity '{}'. Valid levels: low, medium, high",
                s
            )),
        }
    }
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensitivity::Low => write!(f, "low"),
            Sensitivity::Medium => write!(f, "medium"),
            Sensitivity::High => write!(f, "high"),
        }
    }
}

/// Thresholds consumed by the detectors.
///
/// The Western Electric σ bands (1σ/2σ/3σ) are fixed by the rule
/// definitions; sensitivity scales run lengths and the CUSUM interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityProfile {
    pub level: Sensitivity,
    /// |modified z| above which the latest point is an anomaly
    pub anomaly_threshold: f64,
    /// Mann-Kendall p-value below which a trend is significant
    pub significance_cutoff: f64,
    /// Rule 4: consecutive points on one side of the mean
    pub same_side_run: usize,
    /// Rule 4 cousin: consecutive increases (or decreases)
    pub monotonic_run: usize,
    /// CUSUM slack k, in σ
    pub cusum_slack_sigma: f64,
    /// CUSUM decision interval h, in σ
    pub cusum_decision_sigma: f64,
}

impl SensitivityProfile {
    pub fn for_level(level: Sensitivity) -> Self {
        match level {
            Sensitivity::Low => Self {
                level,
                anomaly_threshold: 4.0,
                significance_cutoff: 0.10,
                same_side_run: 9,
                monotonic_run: 7,
                cusum_slack_sigma: 0.5,
                cusum_decision_sigma: 5.0,
            },
            Sensitivity::Medium => Self {
                level,
                anomaly_threshold: 3.5,
                significance_cutoff: 0.05,
                same_side_run: 8,
                monotonic_run: 6,
                cusum_slack_sigma: 0.5,
                cusum_decision_sigma: 4.0,
            },
            Sensitivity::High => Self {
                level,
                anomaly_threshold: 3.0,
                significance_cutoff: 0.01,
                same_side_run: 7,
                monotonic_run: 5,
                cusum_slack_sigma: 0.5,
                cusum_decision_sigma: 3.0,
            },
        }
    }
}

impl Default for SensitivityProfile {
    fn default() -> Self {
        Self::for_level(Sensitivity::Medium)
    }
}
