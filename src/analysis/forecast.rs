//! Threshold-crossing forecasts
//!
//! Extrapolates the Theil-Sen slope from the latest value:
//! `snapshots_until = ceil((target - current) / slope)`. Only a significant,
//! non-flat trend heading toward the target produces a count.

use crate::analysis::trend::SLOPE_EPSILON;
use crate::analysis::Outcome;
use crate::models::{ForecastResult, ForecastStatus, TrendResult};

/// Pure extrapolation, ignoring significance.
///
/// Returns the status and, when reachable, the number of snapshots (≥ 1).
pub fn project(current: f64, slope: f64, target: f64) -> (ForecastStatus, Option<u64>) {
    let gap = target - current;
    if gap == 0.0 {
        return (ForecastStatus::AlreadyCrossed, None);
    }
    if slope.abs() <= SLOPE_EPSILON {
        return (ForecastStatus::FlatTrend, None);
    }

    // A non-positive count means the trend line passed the target already
    let steps = (gap / slope).ceil();
    if steps <= 0.0 {
        (ForecastStatus::AlreadyCrossed, None)
    } else {
        // `as` saturates for absurdly distant targets
        (ForecastStatus::Reachable, Some(steps as u64))
    }
}

/// Forecast for one metric from its trend outcome and latest value.
pub fn forecast(
    metric: &str,
    trend: &Outcome<TrendResult>,
    current: Option<f64>,
    target: f64,
) -> ForecastResult {
    let slope = trend.computed().map(|t| t.slope);

    let (status, snapshots_until) = match (trend.computed(), current) {
        (Some(_), Some(current)) if current == target => (ForecastStatus::AlreadyCrossed, None),
        (Some(t), Some(current)) if t.significant() => project(current, t.slope, target),
        (Some(_), Some(_)) => (ForecastStatus::NotSignificant, None),
        _ => (ForecastStatus::NoTrend, None),
    };

    ForecastResult {
        metric: metric.to_string(),
        target,
        current,
        slope,
        snapshots_until,
        reachable: status == ForecastStatus::Reachable,
        status,
    }
}
