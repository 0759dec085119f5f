//! Project-level configuration support
//!
//! Loads per-project configuration from `repotoire.toml` or
//! `.repotoirerc.json` in the repository root.
//!
//! # Configuration Format
//!
//! ```toml
//! # repotoire.toml
//!
//! [trends]
//! sensitivity = "medium"
//! fail_on_anomaly = false
//! assertions = "delta_cycles<=2,trend_cycles<=0"
//! last = 30
//!
//! [trends.targets]
//! health_score = 60.0
//! cycles = 10
//!
//! [trends.categories]
//! api_breaks = "quality"
//!
//! [trends.regime]
//! baseline_mean = 80.0
//! ```

use crate::analysis::{AnalysisOptions, MetricCategory, Sensitivity};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Project configuration loaded from repotoire.toml or .repotoirerc.json
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub trends: TrendsConfig,
}

/// `[trends]` section
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TrendsConfig {
    /// low, medium or high
    #[serde(default)]
    pub sensitivity: Option<Sensitivity>,

    /// Fail the CI gate on any anomaly
    #[serde(default)]
    pub fail_on_anomaly: Option<bool>,

    /// Default assertion list
    #[serde(default)]
    pub assertions: Option<String>,

    /// Analyze only the newest N snapshots
    #[serde(default)]
    pub last: Option<usize>,

    /// Forecast targets per metric
    #[serde(default)]
    pub targets: BTreeMap<String, f64>,

    /// Classifier overrides per metric
    #[serde(default)]
    pub categories: BTreeMap<String, MetricCategory>,

    #[serde(default)]
    pub regime: RegimeConfig,
}

/// `[trends.regime]` section
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RegimeConfig {
    /// Fixed CUSUM baseline mean instead of the first-half mean
    #[serde(default)]
    pub baseline_mean: Option<f64>,
}

impl TrendsConfig {
    /// Drop values no analysis can use, with a warning for each.
    fn sanitize(mut self) -> Self {
        self.targets.retain(|metric, target| {
            let keep = target.is_finite();
            if !keep {
                warn!("Ignoring non-finite forecast target for '{}'", metric);
            }
            keep
        });

        if let Some(baseline) = self.regime.baseline_mean {
            if !baseline.is_finite() {
                warn!("Ignoring non-finite regime baseline_mean");
                self.regime.baseline_mean = None;
            }
        }

        if self.last == Some(0) {
            warn!("Ignoring last = 0 (must be at least 1)");
            self.last = None;
        }

        if let Some(assertions) = &self.assertions {
            if assertions.trim().is_empty() {
                self.assertions = None;
            }
        }

        self
    }

    /// Analysis options seeded from this section; CLI flags layer on top.
    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            sensitivity: self.sensitivity.unwrap_or_default(),
            targets: self.targets.clone(),
            assertions: self.assertions.clone(),
            fail_on_anomaly: self.fail_on_anomaly.unwrap_or(false),
            category_overrides: self.categories.clone(),
            regime_baseline: self.regime.baseline_mean,
            ..Default::default()
        }
    }
}

/// Load project configuration from the repository root.
///
/// Tries `repotoire.toml`, then `.repotoirerc.json`. A file that fails to
/// parse is skipped with a warning; with nothing usable the defaults apply.
pub fn load_project_config(repo_path: &Path) -> ProjectConfig {
    let toml_path = repo_path.join("repotoire.toml");
    if toml_path.exists() {
        match load_toml_config(&toml_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", toml_path.display());
                return config.sanitized();
            }
            Err(e) => {
                warn!("Failed to load {}: {}", toml_path.display(), e);
            }
        }
    }

    let json_path = repo_path.join(".repotoirerc.json");
    if json_path.exists() {
        match load_json_config(&json_path) {
            Ok(config) => {
                debug!("Loaded project config from {}", json_path.display());
                return config.sanitized();
            }
            Err(e) => {
                warn!("Failed to load {}: {}", json_path.display(), e);
            }
        }
    }

    debug!("No project config found, using defaults");
    ProjectConfig::default()
}

impl ProjectConfig {
    fn sanitized(self) -> Self {
        Self {
            trends: self.trends.sanitize(),
        }
    }
}

fn load_toml_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = toml::from_str(&content)?;
    Ok(config)
}

fn load_json_config(path: &Path) -> anyhow::Result<ProjectConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ProjectConfig = serde_json::from_str(&content)?;
    Ok(config)
}
