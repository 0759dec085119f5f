//! Point anomaly detection with the modified z-score
//!
//! ```text
//! z = 0.6745 * (x - median) / MAD        MAD = median(|x_i - median|)
//! ```
//!
//! When MAD is zero but the values are not all identical (a flat series
//! with a single spike), the scale falls back to the mean absolute
//! deviation: `z = (x - median) / (1.253314 * MeanAD)`. Both zero means
//! every value is the same and no anomaly is possible (z = 0).

use crate::analysis::{stats, Outcome, SensitivityProfile, SkipReason};
use crate::models::{AnomalyResult, MetricSeries, ScaleEstimator};

pub const MIN_OBSERVATIONS: usize = 5;

const MAD_CONSISTENCY: f64 = 0.6745;
const MEAN_AD_CONSISTENCY: f64 = 1.253314;

/// Robust center and scale of one series. `scale` divides the deviation
/// from the median to yield z.
#[derive(Debug, Clone, Copy)]
struct RobustScale {
    median: f64,
    scale: Option<f64>,
    estimator: ScaleEstimator,
}

impl RobustScale {
    fn from_values(values: &[f64]) -> Option<Self> {
        let median = stats::median(values)?;
        let deviations: Vec<f64> = values.iter().map(|v| (v - median).abs()).collect();
        let mad = stats::median(&deviations)?;

        if mad > 0.0 {
            return Some(Self {
                median,
                scale: Some(mad / MAD_CONSISTENCY),
                estimator: ScaleEstimator::Mad,
            });
        }

        let mean_ad = stats::mean(&deviations)?;
        if mean_ad > 0.0 {
            Some(Self {
                median,
                scale: Some(MEAN_AD_CONSISTENCY * mean_ad),
                estimator: ScaleEstimator::MeanAbsoluteDeviation,
            })
        } else {
            Some(Self {
                median,
                scale: None,
                estimator: ScaleEstimator::Degenerate,
            })
        }
    }

    fn z_score(&self, value: f64) -> f64 {
        match self.scale {
            Some(scale) => (value - self.median) / scale,
            None => 0.0,
        }
    }

    fn typical_range(&self, threshold: f64) -> [f64; 2] {
        let half_width = self.scale.map(|s| threshold * s).unwrap_or(0.0);
        [
            (self.median - half_width).round(),
            (self.median + half_width).round(),
        ]
    }

    fn score(&self, metric: &str, index: usize, value: f64, threshold: f64) -> AnomalyResult {
        let z_score = self.z_score(value);
        AnomalyResult {
            metric: metric.to_string(),
            index,
            value,
            median: self.median,
            z_score,
            typical_range: self.typical_range(threshold),
            is_anomaly: z_score.abs() > threshold,
            estimator: self.estimator,
        }
    }
}

fn robust_scale(series: &MetricSeries) -> Result<RobustScale, SkipReason> {
    let values = series.values();
    if values.len() < MIN_OBSERVATIONS {
        return Err(SkipReason::insufficient(MIN_OBSERVATIONS, values.len()));
    }
    RobustScale::from_values(&values)
        .ok_or_else(|| SkipReason::insufficient(MIN_OBSERVATIONS, values.len()))
}

/// Score the most recent present value.
pub fn detect(series: &MetricSeries, profile: &SensitivityProfile) -> Outcome<AnomalyResult> {
    let scale = match robust_scale(series) {
        Ok(scale) => scale,
        Err(reason) => return Outcome::Skipped(reason),
    };
    match series.valid_points().last() {
        Some(&(index, value)) => Outcome::Computed(scale.score(
            series.name(),
            index,
            value,
            profile.anomaly_threshold,
        )),
        None => Outcome::Skipped(SkipReason::insufficient(MIN_OBSERVATIONS, 0)),
    }
}

/// Score the observation at `index` against the whole series.
pub fn score_index(
    series: &MetricSeries,
    index: usize,
    profile: &SensitivityProfile,
) -> Outcome<AnomalyResult> {
    let scale = match robust_scale(series) {
        Ok(scale) => scale,
        Err(reason) => return Outcome::Skipped(reason),
    };
    let value = series
        .observations()
        .iter()
        .find(|o| o.index == index)
        .and_then(|o| o.value);
    match value {
        Some(value) => Outcome::Computed(scale.score(
            series.name(),
            index,
            value,
            profile.anomaly_threshold,
        )),
        None => Outcome::Skipped(SkipReason::not_applicable(format!(
            "no value at index {}",
            index
        ))),
    }
}

/// Every historical point whose |z| crosses the threshold, oldest first.
pub fn scan(series: &MetricSeries, profile: &SensitivityProfile) -> Outcome<Vec<AnomalyResult>> {
    let scale = match robust_scale(series) {
        Ok(scale) => scale,
        Err(reason) => return Outcome::Skipped(reason),
    };
    Outcome::Computed(
        series
            .valid_points()
            .into_iter()
            .map(|(index, value)| {
                scale.score(series.name(), index, value, profile.anomaly_threshold)
            })
            .filter(|a| a.is_anomaly)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> SensitivityProfile {
        SensitivityProfile::default()
    }

    #[test]
    fn test_constant_series_has_zero_z() {
        let s = MetricSeries::from_values("cycles", &[4.0; 6]).unwrap();
        let result = detect(&s, &profile());
        let a = result.computed().expect("computed");
        assert_eq!(a.z_score, 0.0);
        assert!(!a.is_anomaly);
        assert_eq!(a.estimator, ScaleEstimator::Degenerate);
        assert_eq!(a.typical_range, [4.0, 4.0]);
    }

    #[test]
    fn test_spike_on_flat_series_is_anomaly() {
        let s = MetricSeries::from_values("cycles", &[5.0, 5.0, 5.0, 5.0, 5.0, 30.0]).unwrap();
        let a = detect(&s, &profile()).computed().cloned().expect("computed");
        assert!(a.z_score.abs() > 3.5, "z = {}", a.z_score);
        assert!(a.is_anomaly);
        assert_eq!(a.index, 5);
        assert_eq!(a.estimator, ScaleEstimator::MeanAbsoluteDeviation);
    }

    #[test]
    fn test_mad_formula() {
        // median 12.5, deviations 2.5,1.5,0.5,0.5,1.5,17.5 → MAD 1.5
        let s = MetricSeries::from_values("violations", &[10.0, 11.0, 12.0, 13.0, 14.0, 30.0])
            .unwrap();
        let a = detect(&s, &profile()).computed().cloned().unwrap();
        assert_eq!(a.median, 12.5);
        let expected = 0.6745 * (30.0 - 12.5) / 1.5;
        assert!((a.z_score - expected).abs() < 1e-9);
        assert!(a.is_anomaly);
        assert_eq!(a.estimator, ScaleEstimator::Mad);
    }

    #[test]
    fn test_typical_range_is_rounded() {
        let s = MetricSeries::from_values("violations", &[10.0, 11.0, 12.0, 13.0, 14.0]).unwrap();
        let a = detect(&s, &profile()).computed().cloned().unwrap();
        // median 12, MAD 1 → 12 ± 3.5/0.6745
        let half: f64 = 3.5 / 0.6745;
        assert_eq!(a.typical_range, [(12.0 - half).round(), (12.0 + half).round()]);
        assert!(!a.is_anomaly);
    }

    #[test]
    fn test_insufficient_data() {
        let s = MetricSeries::from_values("cycles", &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(
            detect(&s, &profile()),
            Outcome::Skipped(SkipReason::insufficient(5, 4))
        );
    }

    #[test]
    fn test_absent_values_do_not_count() {
        let s = MetricSeries::from_optional(
            "cycles",
            &[Some(1.0), None, Some(1.0), None, Some(1.0), Some(1.0)],
        )
        .unwrap();
        assert!(matches!(
            detect(&s, &profile()),
            Outcome::Skipped(SkipReason::InsufficientData { available: 4, .. })
        ));
    }

    #[test]
    fn test_score_index_and_scan() {
        let s = MetricSeries::from_values("cycles", &[5.0, 40.0, 5.0, 5.0, 5.0, 5.0, 6.0]).unwrap();
        let historical = score_index(&s, 1, &profile());
        assert!(historical.computed().unwrap().is_anomaly);

        let all = scan(&s, &profile());
        let indices: Vec<usize> = all.computed().unwrap().iter().map(|a| a.index).collect();
        assert_eq!(indices, vec![1]);

        assert!(!score_index(&s, 99, &profile()).is_computed());
    }

    #[test]
    fn test_high_sensitivity_lowers_threshold() {
        // MAD 1, median 10 → z = 0.6745 * 5 = 3.37
        let s = MetricSeries::from_values("cycles", &[9.0, 10.0, 11.0, 10.0, 9.0, 11.0, 15.0])
            .unwrap();
        let medium = detect(&s, &SensitivityProfile::default());
        let high = detect(&s, &crate::analysis::Sensitivity::High.profile());
        assert!(!medium.computed().unwrap().is_anomaly);
        assert!(high.computed().unwrap().is_anomaly);
    }
}
