//! CLI contract tests
//!
//! Verifies exit codes (0 pass, 1 gate failed, 2 invalid assertion), JSON
//! output shape, config precedence and --output handling of the
//! repotoire-trends binary.

use std::path::Path;
use std::process::Command;

fn trends_bin() -> String {
    env!("CARGO_BIN_EXE_repotoire-trends").to_string()
}

const HISTORY: &str = r#"[
    {"timestamp": "2026-02-01T00:00:00Z", "files": 100, "cycles": 3, "health_score": 84.0},
    {"timestamp": "2026-02-08T00:00:00Z", "files": 103, "cycles": 3, "health_score": 83.0},
    {"timestamp": "2026-02-15T00:00:00Z", "files": 105, "cycles": 4, "health_score": 82.5},
    {"timestamp": "2026-02-22T00:00:00Z", "files": 108, "cycles": 4, "health_score": 81.0},
    {"timestamp": "2026-03-01T00:00:00Z", "files": 110, "cycles": 5, "health_score": 80.0},
    {"timestamp": "2026-03-08T00:00:00Z", "files": 113, "cycles": 5, "health_score": 79.5},
    {"timestamp": "2026-03-15T00:00:00Z", "files": 117, "cycles": 6, "health_score": 78.0},
    {"timestamp": "2026-03-22T00:00:00Z", "files": 120, "cycles": 6, "health_score": 77.0}
]"#;

fn setup_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("history.json"), HISTORY).unwrap();
    dir
}

fn run_analyze(dir: &Path, extra_args: &[&str]) -> (i32, String, String) {
    let mut cmd = Command::new(trends_bin());
    cmd.arg("analyze")
        .arg(dir.join("history.json"))
        .arg("--path")
        .arg(dir)
        .env_remove("RUST_LOG");
    for arg in extra_args {
        cmd.arg(arg);
    }
    let output = cmd.output().expect("Failed to run repotoire-trends");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);
    (code, stdout, stderr)
}

fn parse_json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).expect("Invalid JSON on stdout")
}

// ============================================================================
// Exit codes
// ============================================================================

#[test]
fn test_plain_analysis_exits_zero() {
    let dir = setup_repo();
    let (code, stdout, _) = run_analyze(dir.path(), &[]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Trend Analysis"));
}

#[test]
fn test_failed_assertion_exits_one() {
    let dir = setup_repo();
    let (code, stdout, stderr) =
        run_analyze(dir.path(), &["--assert", "delta_cycles<=2", "--format", "json"]);
    assert_eq!(code, 1, "stderr: {}", stderr);

    let v = parse_json(&stdout);
    assert_eq!(v["assertions"]["passed"], false);
    assert_eq!(v["assertions"]["outcomes"][0]["observed_value"], 3.0);
}

#[test]
fn test_passing_assertion_exits_zero() {
    let dir = setup_repo();
    let (code, _, stderr) = run_analyze(dir.path(), &["--assert", "cycles<=10,files>=100"]);
    assert_eq!(code, 0, "stderr: {}", stderr);
}

#[test]
fn test_invalid_assertion_exits_two_with_results() {
    let dir = setup_repo();
    let (code, stdout, stderr) =
        run_analyze(dir.path(), &["--assert", "bogus_metric<=1", "--format", "json"]);
    assert_eq!(code, 2);
    assert!(stderr.contains("bogus_metric"), "stderr: {}", stderr);

    // Analysis is still reported
    let v = parse_json(&stdout);
    assert_eq!(v["assertions"]["status"], "invalid");
    assert!(!v["trends"].as_array().unwrap().is_empty());
}

#[test]
fn test_missing_history_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_analyze(dir.path(), &[]);
    assert_ne!(code, 0);
    assert!(stderr.contains("history"), "stderr: {}", stderr);
}

// ============================================================================
// Output
// ============================================================================

#[test]
fn test_json_output_shape() {
    let dir = setup_repo();
    let (code, stdout, _) = run_analyze(
        dir.path(),
        &["--format", "json", "--target", "health_score=70"],
    );
    assert_eq!(code, 0);

    let v = parse_json(&stdout);
    for key in [
        "summary",
        "anomalies",
        "trends",
        "forecasts",
        "patterns",
        "regimes",
        "assertions",
    ] {
        assert!(v.get(key).is_some(), "missing key {}", key);
    }
    assert_eq!(v["summary"]["verdict"], "degrading");
    assert_eq!(v["summary"]["trend_direction"], "decreasing");
    assert_eq!(v["forecasts"][0]["metric"], "health_score");
    assert_eq!(v["forecasts"][0]["reachable"], true);
}

#[test]
fn test_output_file() {
    let dir = setup_repo();
    let out = dir.path().join("report.json");
    let (code, stdout, _) = run_analyze(
        dir.path(),
        &["--format", "json", "-o", out.to_str().unwrap()],
    );
    assert_eq!(code, 0);
    assert!(stdout.is_empty());

    let content = std::fs::read_to_string(&out).unwrap();
    let v: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(v["summary"]["metrics_analyzed"], 3);
}

#[test]
fn test_all_patterns_flag() {
    let dir = tempfile::tempdir().unwrap();
    let mut cycles: Vec<f64> = [10.0, 11.0, 9.0].repeat(10);
    cycles.extend([9.5, 10.0, 10.5, 11.0, 11.5, 40.0]);
    let snapshots: Vec<serde_json::Value> = cycles
        .iter()
        .map(|c| serde_json::json!({ "cycles": c }))
        .collect();
    std::fs::write(
        dir.path().join("history.json"),
        serde_json::to_string(&snapshots).unwrap(),
    )
    .unwrap();

    let (_, stdout, _) = run_analyze(dir.path(), &["--format", "json"]);
    assert_eq!(parse_json(&stdout)["patterns"].as_array().unwrap().len(), 1);

    let (_, stdout, _) = run_analyze(dir.path(), &["--format", "json", "--all-patterns"]);
    let patterns = parse_json(&stdout)["patterns"].as_array().unwrap().clone();
    assert!(patterns.len() > 1, "patterns: {:?}", patterns);
}

#[test]
fn test_last_window() {
    let dir = setup_repo();
    let (_, stdout, _) = run_analyze(dir.path(), &["--format", "json", "--last", "3"]);
    let v = parse_json(&stdout);
    let trends = v["trends"].as_array().unwrap();
    // Three points are below the Theil-Sen minimum
    assert!(trends.is_empty());
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_assertions_apply() {
    let dir = setup_repo();
    std::fs::write(
        dir.path().join("repotoire.toml"),
        "[trends]\nassertions = \"delta_cycles<=1\"\n",
    )
    .unwrap();
    let (code, _, _) = run_analyze(dir.path(), &[]);
    assert_eq!(code, 1);

    // Flag overrides config
    let (code, _, _) = run_analyze(dir.path(), &["--assert", "delta_cycles<=5"]);
    assert_eq!(code, 0);
}

#[test]
fn test_init_writes_config() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(trends_bin())
        .arg("init")
        .arg(dir.path())
        .output()
        .expect("Failed to run repotoire-trends");
    assert!(output.status.success());

    let content = std::fs::read_to_string(dir.path().join("repotoire.toml")).unwrap();
    assert!(content.contains("[trends]"));
}
