//! Snapshot history loading
//!
//! A history file is a JSON array of snapshot objects, or an object with a
//! `snapshots` array. Every key other than `timestamp` is a metric:
//!
//! ```json
//! [
//!   {"timestamp": "2026-01-05T10:00:00Z", "files": 120, "cycles": 3, "health_score": 81.5},
//!   {"timestamp": 1767693600, "files": 124, "cycles": "4", "health_score": null}
//! ]
//! ```
//!
//! Numbers and numeric strings are samples; `null`, booleans, other
//! strings and missing keys are absent samples. A snapshot's position in
//! the file is its index.

use crate::analysis::AnalysisError;
use crate::models::{MetricSeries, Observation};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Failed to read snapshot history {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot history is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Snapshot history must be an array of objects or {{\"snapshots\": [...]}}")]
    UnexpectedShape,

    #[error("Snapshot {index} is not a JSON object")]
    NotAnObject { index: usize },

    #[error(transparent)]
    Series(#[from] AnalysisError),
}

/// One periodic measurement of every metric
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub index: usize,
    pub timestamp: Option<DateTime<Utc>>,
    pub metrics: BTreeMap<String, Option<f64>>,
}

/// Snapshots in chronological order, oldest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotHistory {
    snapshots: Vec<Snapshot>,
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

fn parse_sample(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    v.filter(|v| v.is_finite())
}

fn parse_snapshot(index: usize, object: &Map<String, Value>) -> Snapshot {
    let mut timestamp = None;
    let mut metrics = BTreeMap::new();

    for (key, value) in object {
        if key == "timestamp" {
            timestamp = parse_timestamp(value);
            if timestamp.is_none() && !value.is_null() {
                warn!("Snapshot {}: unparseable timestamp {}", index, value);
            }
            continue;
        }

        let sample = parse_sample(value);
        if sample.is_none() && !value.is_null() {
            debug!("Snapshot {}: '{}' = {} treated as absent", index, key, value);
        }
        metrics.insert(key.clone(), sample);
    }

    Snapshot {
        index,
        timestamp,
        metrics,
    }
}

impl SnapshotHistory {
    pub fn from_json_str(input: &str) -> Result<Self, HistoryError> {
        let document: Value = serde_json::from_str(input)?;
        let entries = match &document {
            Value::Array(entries) => entries,
            Value::Object(root) => match root.get("snapshots") {
                Some(Value::Array(entries)) => entries,
                _ => return Err(HistoryError::UnexpectedShape),
            },
            _ => return Err(HistoryError::UnexpectedShape),
        };

        let snapshots = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| match entry {
                Value::Object(object) => Ok(parse_snapshot(index, object)),
                _ => Err(HistoryError::NotAnObject { index }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Loaded {} snapshots", snapshots.len());
        Ok(Self { snapshots })
    }

    pub fn load(path: &Path) -> Result<Self, HistoryError> {
        let content = std::fs::read_to_string(path).map_err(|source| HistoryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Keep the newest `n` snapshots, re-indexed from 0.
    pub fn window_last(&self, n: usize) -> Self {
        let skip = self.snapshots.len().saturating_sub(n);
        let snapshots = self.snapshots[skip..]
            .iter()
            .enumerate()
            .map(|(index, snap)| Snapshot {
                index,
                ..snap.clone()
            })
            .collect();
        Self { snapshots }
    }

    /// Every metric that appears in at least one snapshot, sorted.
    pub fn metric_names(&self) -> Vec<String> {
        let names: BTreeSet<&String> = self
            .snapshots
            .iter()
            .flat_map(|s| s.metrics.keys())
            .collect();
        names.into_iter().cloned().collect()
    }

    /// One series per metric. Snapshots missing a metric contribute an
    /// absent observation at their index.
    pub fn to_series(&self) -> Result<Vec<MetricSeries>, HistoryError> {
        self.metric_names()
            .into_iter()
            .map(|name| {
                let observations = self
                    .snapshots
                    .iter()
                    .map(|snap| Observation {
                        index: snap.index,
                        timestamp: snap.timestamp,
                        value: snap.metrics.get(&name).copied().flatten(),
                    })
                    .collect();
                Ok(MetricSeries::new(name, observations)?)
            })
            .collect()
    }
}

/// Read a history file into per-metric series.
pub fn load_history(path: &Path) -> Result<SnapshotHistory, HistoryError> {
    SnapshotHistory::load(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"timestamp": "2026-01-05T10:00:00Z", "files": 120, "cycles": 3},
        {"timestamp": 1767693600, "files": 124, "cycles": "4"},
        {"files": 130, "cycles": null, "health_score": 80.5},
        {"files": true, "cycles": "n/a"}
    ]"#;

    #[test]
    fn test_parse_array_document() {
        let history = SnapshotHistory::from_json_str(SAMPLE).unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(
            history.metric_names(),
            vec!["cycles".to_string(), "files".to_string(), "health_score".to_string()]
        );

        let first = &history.snapshots()[0];
        assert_eq!(
            first.timestamp.unwrap().to_rfc3339(),
            "2026-01-05T10:00:00+00:00"
        );
        assert_eq!(
            history.snapshots()[1].timestamp,
            Utc.timestamp_opt(1_767_693_600, 0).single()
        );
    }

    #[test]
    fn test_absent_samples_keep_indices() {
        let history = SnapshotHistory::from_json_str(SAMPLE).unwrap();
        let series = history.to_series().unwrap();

        let cycles = series.iter().find(|s| s.name() == "cycles").unwrap();
        assert_eq!(cycles.valid_points(), vec![(0, 3.0), (1, 4.0)]);
        assert_eq!(cycles.observations().len(), 4);

        let health = series.iter().find(|s| s.name() == "health_score").unwrap();
        assert_eq!(health.valid_points(), vec![(2, 80.5)]);

        let files = series.iter().find(|s| s.name() == "files").unwrap();
        assert_eq!(files.values(), vec![120.0, 124.0, 130.0]);
    }

    #[test]
    fn test_wrapped_document() {
        let history =
            SnapshotHistory::from_json_str(r#"{"snapshots": [{"cycles": 1}, {"cycles": 2}]}"#)
                .unwrap();
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(matches!(
            SnapshotHistory::from_json_str(r#"{"cycles": 1}"#),
            Err(HistoryError::UnexpectedShape)
        ));
        assert!(matches!(
            SnapshotHistory::from_json_str(r#"[{"cycles": 1}, 5]"#),
            Err(HistoryError::NotAnObject { index: 1 })
        ));
        assert!(matches!(
            SnapshotHistory::from_json_str("not json"),
            Err(HistoryError::Json(_))
        ));
    }

    #[test]
    fn test_window_last_rebases_indices() {
        let history = SnapshotHistory::from_json_str(SAMPLE).unwrap();
        let window = history.window_last(2);
        assert_eq!(window.len(), 2);
        assert_eq!(window.snapshots()[0].index, 0);
        assert_eq!(window.snapshots()[0].metrics.get("files"), Some(&Some(130.0)));

        assert_eq!(history.window_last(10).len(), 4);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(load_history(&path).unwrap().len(), 4);

        let missing = dir.path().join("missing.json");
        assert!(matches!(load_history(&missing), Err(HistoryError::Io { .. })));
    }
}
