//! Init command - add an example [trends] section to repotoire.toml

use anyhow::{Context, Result};
use console::style;
use std::io::Write;
use std::path::Path;

const TRENDS_SECTION: &str = r#"
[trends]
# Detector sensitivity: low, medium, high
sensitivity = "medium"

# Fail CI when the latest value of any metric is anomalous
fail_on_anomaly = false

# CI gate assertions: <metric>, delta_<metric> or trend_<metric>
# assertions = "delta_cycles<=2,trend_cycles<=0"

# Analyze only the newest N snapshots
# last = 30

[trends.targets]
# Forecast when a metric crosses a threshold
# health_score = 60.0

[trends.categories]
# Override metric categories: growth, quality, composite
# bundle_kb = "growth"

[trends.regime]
# Fixed CUSUM baseline for composite metrics (default: mean of the first half)
# baseline_mean = 80.0
"#;

/// Run the init command
pub fn run(path: &Path) -> Result<()> {
    let repo_path = path
        .canonicalize()
        .with_context(|| format!("Path does not exist: {}", path.display()))?;

    if !repo_path.is_dir() {
        anyhow::bail!("Path is not a directory: {}", repo_path.display());
    }

    let config_path = repo_path.join("repotoire.toml");
    let status = write_trends_section(&config_path)?;

    match status {
        InitStatus::AlreadyConfigured => println!(
            "{} {} already has a [trends] section",
            style("✓").green(),
            style(config_path.display()).cyan()
        ),
        InitStatus::Appended => println!(
            "{} Added [trends] section to {}",
            style("✓").green(),
            style(config_path.display()).cyan()
        ),
        InitStatus::Created => println!(
            "{} Created {}",
            style("✓").green(),
            style(config_path.display()).cyan()
        ),
    }

    println!("\nNext steps:");
    println!(
        "  {} Analyze a snapshot history",
        style("repotoire-trends analyze history.json").cyan()
    );

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum InitStatus {
    Created,
    Appended,
    AlreadyConfigured,
}

fn write_trends_section(config_path: &Path) -> Result<InitStatus> {
    if !config_path.exists() {
        let content = format!("# Repotoire Configuration\n{}", TRENDS_SECTION);
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to create {}", config_path.display()))?;
        return Ok(InitStatus::Created);
    }

    let existing = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    if existing.lines().any(|l| l.trim() == "[trends]") {
        return Ok(InitStatus::AlreadyConfigured);
    }

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(config_path)
        .with_context(|| format!("Failed to open {}", config_path.display()))?;
    file.write_all(TRENDS_SECTION.as_bytes())?;
    Ok(InitStatus::Appended)
}
