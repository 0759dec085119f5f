//! Repotoire Trends - statistical analysis of code-health snapshot histories
//!
//! Turns an ordered series of health snapshots (files, symbols, cycles,
//! dead exports, violations, health score) into anomalies, robust trends,
//! control-chart patterns, regime shifts and threshold forecasts, plus a
//! CI gate decision driven by a small assertion language.

pub mod analysis;
pub mod config;
pub mod history;
pub mod models;
pub mod reporters;

pub use analysis::{analyze, AnalysisError, AnalysisOptions, Outcome, SkipReason};
pub use models::{AnalysisResult, MetricSeries, Observation};
