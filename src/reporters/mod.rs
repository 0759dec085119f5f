//! Output reporters for trend analysis results
//!
//! Supports two output formats:
//! - `text` - Terminal summary with colors and sparklines
//! - `json` - Machine-readable JSON for CI pipelines

mod json;
mod text;

use crate::models::AnalysisResult;
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!(
                "Unknown format '{}'. Valid formats: text, json",
                s
            )),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Render an analysis result in the specified format
pub fn report(result: &AnalysisResult, format: &str) -> Result<String> {
    let fmt = OutputFormat::from_str(format)?;
    report_with_format(result, fmt)
}

/// Render an analysis result using an OutputFormat enum
pub fn report_with_format(result: &AnalysisResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => text::render(result),
        OutputFormat::Json => json::render(result),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::{analyze, AnalysisOptions};
    use crate::models::MetricSeries;

    /// Analysis of a small history with a rising cycle count, a spike in
    /// dead exports and a declining health score.
    pub(crate) fn test_result() -> AnalysisResult {
        let cycles: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let dead = [4.0, 4.0, 5.0, 4.0, 4.0, 5.0, 4.0, 4.0, 5.0, 40.0];
        let health: Vec<f64> = (0..10).map(|v| 90.0 - 1.5 * v as f64).collect();
        let files: Vec<f64> = (0..10).map(|v| 100.0 + 3.0 * v as f64).collect();

        let series = vec![
            MetricSeries::from_values("cycles", &cycles).unwrap(),
            MetricSeries::from_values("dead_exports", &dead).unwrap(),
            MetricSeries::from_values("health_score", &health).unwrap(),
            MetricSeries::from_values("files", &files).unwrap(),
        ];

        let mut options = AnalysisOptions::default();
        options.targets.insert("health_score".into(), 60.0);
        options.assertions = Some("delta_cycles<=2,files>=100".into());
        analyze(&series, &options).unwrap()
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::from_str("text").unwrap(), OutputFormat::Text);
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(
            OutputFormat::from_str("terminal").unwrap(),
            OutputFormat::Text
        );
        assert!(OutputFormat::from_str("sarif").is_err());
    }

    #[test]
    fn test_report_dispatch() {
        let result = test_result();
        assert!(report(&result, "json").unwrap().trim_start().starts_with('{'));
        assert!(report(&result, "text").unwrap().contains("Trend Analysis"));
        assert!(report(&result, "xml").is_err());
    }
}
