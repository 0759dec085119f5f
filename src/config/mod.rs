//! Configuration module for repotoire-trends
//!
//! Project-level `[trends]` settings from `repotoire.toml`: sensitivity,
//! CI gate defaults, forecast targets and classifier overrides.

mod project_config;

pub use project_config::{load_project_config, ProjectConfig, RegimeConfig, TrendsConfig};
