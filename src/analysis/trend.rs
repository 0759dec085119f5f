//! Robust trend estimation
//!
//! The slope is the Theil-Sen estimator: the median of the slopes of every
//! pair of observations, `(y_j - y_i) / (j - i)` for `i < j`. Up to ~29% of
//! the points can be outliers without moving it. Indices (not positions)
//! are used for `j - i`, so absent samples stretch the spacing instead of
//! compressing it.
//!
//! Significance comes from the Mann-Kendall test:
//!
//! ```text
//! S      = Σ_{i<j} sign(y_j - y_i)
//! Var(S) = [n(n-1)(2n+5) - Σ t(t-1)(2t+5)] / 18      (t = size of each tie group)
//! Z      = (S - 1)/√Var  if S > 0,  (S + 1)/√Var  if S < 0,  0 otherwise
//! p      = 2 * (1 - Φ(|Z|))
//! ```
//!
//! Theil-Sen needs 4 observations and Mann-Kendall needs 8; each skips
//! independently.

use crate::analysis::{stats, Outcome, SensitivityProfile, SkipReason};
use crate::models::{Direction, MannKendall, MetricSeries, TrendResult};

pub const MIN_THEIL_SEN: usize = 4;
pub const MIN_MANN_KENDALL: usize = 8;

/// Slopes within ±SLOPE_EPSILON of zero count as flat
pub const SLOPE_EPSILON: f64 = 1e-9;

impl Direction {
    pub fn from_slope(slope: f64) -> Self {
        if slope > SLOPE_EPSILON {
            Direction::Increasing
        } else if slope < -SLOPE_EPSILON {
            Direction::Decreasing
        } else {
            Direction::Flat
        }
    }
}

/// Median of all pairwise slopes. `None` with fewer than two points.
pub fn theil_sen_slope(points: &[(usize, f64)]) -> Option<f64> {
    let n = points.len();
    let mut slopes = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for (i, &(xi, yi)) in points.iter().enumerate() {
        for &(xj, yj) in &points[i + 1..] {
            slopes.push((yj - yi) / (xj - xi) as f64);
        }
    }
    stats::median(&slopes)
}

fn sign(delta: f64) -> i64 {
    if delta > 0.0 {
        1
    } else if delta < 0.0 {
        -1
    } else {
        0
    }
}

/// Sizes of each group of exactly-equal values (only groups of 2+)
fn tie_groups(values: &[f64]) -> Vec<usize> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut groups = Vec::new();
    let mut run = 1usize;
    for pair in sorted.windows(2) {
        if pair[0] == pair[1] {
            run += 1;
        } else {
            if run > 1 {
                groups.push(run);
            }
            run = 1;
        }
    }
    if run > 1 {
        groups.push(run);
    }
    groups
}

/// Mann-Kendall trend test on values in chronological order.
pub fn mann_kendall(values: &[f64], significance_cutoff: f64) -> MannKendall {
    let n = values.len();

    let mut s: i64 = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            s += sign(values[j] - values[i]);
        }
    }

    let nf = n as f64;
    let tie_term: f64 = tie_groups(values)
        .into_iter()
        .map(|t| {
            let t = t as f64;
            t * (t - 1.0) * (2.0 * t + 5.0)
        })
        .sum();
    let variance = (nf * (nf - 1.0) * (2.0 * nf + 5.0) - tie_term) / 18.0;

    let z = if variance <= 0.0 {
        0.0
    } else if s > 0 {
        (s - 1) as f64 / variance.sqrt()
    } else if s < 0 {
        (s + 1) as f64 / variance.sqrt()
    } else {
        0.0
    };

    // Φ(0) from the erf approximation is off by ~1e-9; pin the no-trend case.
    let p_value = if z == 0.0 {
        1.0
    } else {
        (2.0 * (1.0 - stats::normal_cdf(z.abs()))).clamp(0.0, 1.0)
    };

    MannKendall {
        s,
        variance,
        z,
        p_value,
        significant: p_value < significance_cutoff,
    }
}

/// Theil-Sen slope plus Mann-Kendall significance for one series.
pub fn estimate(series: &MetricSeries, profile: &SensitivityProfile) -> Outcome<TrendResult> {
    let points = series.valid_points();
    if points.len() < MIN_THEIL_SEN {
        return Outcome::Skipped(SkipReason::insufficient(MIN_THEIL_SEN, points.len()));
    }

    let slope = match theil_sen_slope(&points) {
        Some(slope) => slope,
        None => return Outcome::Skipped(SkipReason::insufficient(MIN_THEIL_SEN, points.len())),
    };

    let significance = if points.len() < MIN_MANN_KENDALL {
        Outcome::Skipped(SkipReason::insufficient(MIN_MANN_KENDALL, points.len()))
    } else {
        let values: Vec<f64> = points.iter().map(|&(_, v)| v).collect();
        Outcome::Computed(mann_kendall(&values, profile.significance_cutoff))
    };

    Outcome::Computed(TrendResult {
        metric: series.name().to_string(),
        slope,
        direction: Direction::from_slope(slope),
        observations: points.len(),
        significance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> SensitivityProfile {
        SensitivityProfile::default()
    }

    #[test]
    fn test_constant_series_is_flat_and_not_significant() {
        let s = MetricSeries::from_values("cycles", &[7.0; 10]).unwrap();
        let t = estimate(&s, &profile()).computed().cloned().unwrap();
        assert_eq!(t.slope, 0.0);
        assert_eq!(t.direction, Direction::Flat);
        assert_eq!(t.p_value(), Some(1.0));
        assert!(!t.significant());
    }

    #[test]
    fn test_monotonic_series_is_significant() {
        let values: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let s = MetricSeries::from_values("cycles", &values).unwrap();
        let t = estimate(&s, &profile()).computed().cloned().unwrap();
        assert!((t.slope - 1.0).abs() < 1e-12);
        assert_eq!(t.direction, Direction::Increasing);
        assert!(t.significant());

        let mk = t.significance.computed().unwrap();
        assert_eq!(mk.s, 45);
        assert!((mk.variance - 125.0).abs() < 1e-9);
        assert!((mk.z - 44.0 / 125.0f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_theil_sen_ignores_single_outlier() {
        let points: Vec<(usize, f64)> = vec![
            (0, 0.0),
            (1, 2.0),
            (2, 4.0),
            (3, 100.0),
            (4, 8.0),
            (5, 10.0),
        ];
        let slope = theil_sen_slope(&points).unwrap();
        assert!((slope - 2.0).abs() < 1e-9, "slope = {}", slope);
    }

    #[test]
    fn test_theil_sen_uses_index_spacing() {
        // Absent sample at index 1: 0 → 4 over two steps is slope 2
        let s = MetricSeries::from_optional(
            "dead_exports",
            &[Some(0.0), None, Some(4.0), Some(6.0), Some(8.0)],
        )
        .unwrap();
        let t = estimate(&s, &profile()).computed().cloned().unwrap();
        assert!((t.slope - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_mann_kendall_skipped_below_eight() {
        let s = MetricSeries::from_values("cycles", &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let t = estimate(&s, &profile()).computed().cloned().unwrap();
        assert!(t.slope > 0.0);
        assert_eq!(
            t.significance,
            Outcome::Skipped(SkipReason::insufficient(8, 5))
        );
        assert!(!t.significant());
        assert_eq!(t.p_value(), None);
    }

    #[test]
    fn test_theil_sen_skipped_below_four() {
        let s = MetricSeries::from_values("cycles", &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(
            estimate(&s, &profile()),
            Outcome::Skipped(SkipReason::insufficient(4, 3))
        );
    }

    #[test]
    fn test_tie_correction_reduces_variance() {
        let values = [1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(tie_groups(&values), vec![2, 3]);
        let mk = mann_kendall(&values, 0.05);
        let untied = 8.0 * 7.0 * 21.0 / 18.0;
        let ties = (2.0 * 1.0 * 9.0 + 3.0 * 2.0 * 11.0) / 18.0;
        assert!((mk.variance - (untied - ties)).abs() < 1e-9);
    }

    #[test]
    fn test_noisy_flat_series_not_significant() {
        let values = [5.0, 6.0, 4.0, 5.0, 6.0, 4.0, 5.0, 6.0, 4.0, 5.0];
        let mk = mann_kendall(&values, 0.05);
        assert!(!mk.significant, "p = {}", mk.p_value);
    }

    #[test]
    fn test_decreasing_direction() {
        let values: Vec<f64> = (0..8).map(|v| 90.0 - 2.0 * v as f64).collect();
        let s = MetricSeries::from_values("health_score", &values).unwrap();
        let t = estimate(&s, &profile()).computed().cloned().unwrap();
        assert_eq!(t.direction, Direction::Decreasing);
        assert!(t.significant());
        assert!(t.significance.computed().unwrap().z < 0.0);
    }
}
