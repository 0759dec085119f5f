//! Regime-shift detection with a two-sided CUSUM chart
//!
//! ```text
//! C⁺ₜ = max(0, C⁺ₜ₋₁ + (xₜ - μ₀ - k))     upward shifts
//! C⁻ₜ = max(0, C⁻ₜ₋₁ + (μ₀ - xₜ - k))     downward shifts
//! ```
//!
//! μ₀ is the mean of the first half of the series (or a configured
//! baseline), σ the sample standard deviation of that half. A flat
//! baseline half falls back to σ of the whole series. The shift index is
//! the first t where either sum exceeds the decision interval h.

use crate::analysis::{stats, Outcome, SensitivityProfile, SkipReason};
use crate::models::{Direction, MetricSeries, RegimeResult};

pub const MIN_OBSERVATIONS: usize = 8;

/// Run CUSUM over one series. `baseline_mean` overrides μ₀.
pub fn detect(
    series: &MetricSeries,
    profile: &SensitivityProfile,
    baseline_mean: Option<f64>,
) -> Outcome<RegimeResult> {
    let points = series.valid_points();
    if points.len() < MIN_OBSERVATIONS {
        return Outcome::Skipped(SkipReason::insufficient(MIN_OBSERVATIONS, points.len()));
    }

    let values: Vec<f64> = points.iter().map(|&(_, v)| v).collect();
    let baseline = &values[..values.len() / 2];

    let mu0 = match baseline_mean.or_else(|| stats::mean(baseline)) {
        Some(mu0) => mu0,
        None => return Outcome::Skipped(SkipReason::insufficient(MIN_OBSERVATIONS, 0)),
    };

    let sigma = stats::sample_std_dev(baseline)
        .filter(|s| *s > 0.0)
        .or_else(|| stats::sample_std_dev(&values).filter(|s| *s > 0.0));
    let Some(sigma) = sigma else {
        return Outcome::Skipped(SkipReason::degenerate("zero standard deviation"));
    };

    let k = profile.cusum_slack_sigma * sigma;
    let h = profile.cusum_decision_sigma * sigma;

    let mut c_plus = 0.0f64;
    let mut c_minus = 0.0f64;
    let mut shift: Option<(usize, Direction)> = None;

    for &(index, x) in &points {
        c_plus = (c_plus + (x - mu0 - k)).max(0.0);
        c_minus = (c_minus + (mu0 - x - k)).max(0.0);

        if c_plus > h {
            shift = Some((index, Direction::Increasing));
            break;
        }
        if c_minus > h {
            shift = Some((index, Direction::Decreasing));
            break;
        }
    }

    Outcome::Computed(RegimeResult {
        metric: series.name().to_string(),
        shift_detected: shift.is_some(),
        shift_index: shift.map(|(i, _)| i),
        direction: shift.map(|(_, d)| d).unwrap_or(Direction::Flat),
        baseline_mean: mu0,
        sigma,
        decision_interval: h,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> SensitivityProfile {
        SensitivityProfile::default()
    }

    fn step_series() -> MetricSeries {
        let values = [
            10.2, 9.1, 10.8, 9.6, 10.4, 11.0, 9.3, 9.9, // mean ≈ 10, σ ≈ 0.7
            20.3, 19.2, 21.1, 19.8, 20.6, 18.9, 20.2, 19.7,
        ];
        MetricSeries::from_values("health_score", &values).unwrap()
    }

    #[test]
    fn test_step_change_detected_in_second_half() {
        let r = detect(&step_series(), &profile(), None)
            .computed()
            .cloned()
            .unwrap();
        assert!(r.shift_detected);
        let idx = r.shift_index.unwrap();
        assert!((8..16).contains(&idx), "shift at {}", idx);
        assert_eq!(r.direction, Direction::Increasing);
    }

    #[test]
    fn test_noise_free_step_falls_back_to_whole_series_sigma() {
        let mut values = vec![10.0; 8];
        values.extend(vec![20.0; 8]);
        let s = MetricSeries::from_values("health_score", &values).unwrap();
        let r = detect(&s, &profile(), None).computed().cloned().unwrap();
        assert!(r.shift_detected);
        assert!(r.shift_index.unwrap() >= 8);
        assert!(r.sigma > 5.0);
    }

    #[test]
    fn test_downward_shift() {
        let mut values = vec![80.0, 81.0, 79.0, 80.5, 79.5, 80.0, 81.0, 79.0];
        values.extend([70.0, 69.0, 71.0, 70.0, 69.5, 70.5, 70.0, 69.0]);
        let s = MetricSeries::from_values("health_score", &values).unwrap();
        let r = detect(&s, &profile(), None).computed().cloned().unwrap();
        assert!(r.shift_detected);
        assert_eq!(r.direction, Direction::Decreasing);
    }

    #[test]
    fn test_stable_series_has_no_shift() {
        let values = [
            80.0, 81.0, 79.0, 80.5, 79.5, 80.0, 81.0, 79.0, 80.0, 80.5, 79.5, 80.0,
        ];
        let s = MetricSeries::from_values("health_score", &values).unwrap();
        let r = detect(&s, &profile(), None).computed().cloned().unwrap();
        assert!(!r.shift_detected);
        assert_eq!(r.shift_index, None);
        assert_eq!(r.direction, Direction::Flat);
    }

    #[test]
    fn test_requires_eight_points() {
        let s = MetricSeries::from_values("health_score", &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(
            detect(&s, &profile(), None),
            Outcome::Skipped(SkipReason::insufficient(8, 3))
        );
    }

    #[test]
    fn test_constant_series_is_degenerate() {
        let s = MetricSeries::from_values("health_score", &[50.0; 10]).unwrap();
        assert!(matches!(
            detect(&s, &profile(), None),
            Outcome::Skipped(SkipReason::DegenerateInput { .. })
        ));
    }

    #[test]
    fn test_configured_baseline_overrides_first_half() {
        let values = [
            80.0, 81.0, 79.0, 80.5, 79.5, 80.0, 81.0, 79.0, 80.0, 80.5,
        ];
        let s = MetricSeries::from_values("health_score", &values).unwrap();
        let r = detect(&s, &profile(), Some(90.0)).computed().cloned().unwrap();
        assert_eq!(r.baseline_mean, 90.0);
        assert!(r.shift_detected);
        assert_eq!(r.direction, Direction::Decreasing);
    }
}
