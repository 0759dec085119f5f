//! Western Electric control-chart rules
//!
//! Bands are built from the mean μ and sample standard deviation σ of the
//! present values. Windows are evaluated oldest-first, ending at each point
//! in turn; within one window the rules are checked in priority order:
//!
//! 1. one point beyond μ ± 3σ
//! 2. two of three consecutive points beyond μ ± 2σ, same side
//! 3. four of five consecutive points beyond μ ± 1σ, same side
//! 4. a run of consecutive points on one side of μ
//!    (then its cousin: a run of consecutive increases or decreases)
//!
//! Rules 2 and 3 only fire when the newest point of the window is itself
//! beyond the band, so a single excursion is reported once. Run rules
//! report once per run. A point exactly at μ breaks a same-side run; an
//! unchanged value breaks a monotonic run.

use crate::analysis::{stats, Outcome, SensitivityProfile, SkipReason};
use crate::models::{MetricSeries, PatternMatch, PatternRule};

pub const MIN_OBSERVATIONS: usize = 2;

/// Whether to stop at the earliest violation or collect all of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    #[default]
    FirstMatch,
    Exhaustive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Above,
    Below,
    Center,
}

impl Side {
    fn label(&self) -> &'static str {
        match self {
            Side::Above => "above",
            Side::Below => "below",
            Side::Center => "at",
        }
    }
}

struct Bands {
    mean: f64,
    sigma: f64,
}

impl Bands {
    fn side(&self, value: f64) -> Side {
        if value > self.mean {
            Side::Above
        } else if value < self.mean {
            Side::Below
        } else {
            Side::Center
        }
    }

    /// Signed distance from the mean in σ units
    fn sigmas(&self, value: f64) -> f64 {
        (value - self.mean) / self.sigma
    }

    /// Side of `value` if it lies strictly beyond `k` σ, else `None`
    fn beyond(&self, value: f64, k: f64) -> Option<Side> {
        let d = self.sigmas(value);
        if d > k {
            Some(Side::Above)
        } else if d < -k {
            Some(Side::Below)
        } else {
            None
        }
    }
}

struct Scanner<'a> {
    metric: &'a str,
    points: &'a [(usize, f64)],
    bands: Bands,
    same_side_run: usize,
    monotonic_run: usize,
}

impl Scanner<'_> {
    fn make(
        &self,
        rule: PatternRule,
        start: usize,
        end: usize,
        description: String,
    ) -> PatternMatch {
        PatternMatch {
            metric: self.metric.to_string(),
            rule_id: rule.rule_id(),
            rule,
            kind: rule.kind(),
            window_start: self.points[start].0,
            window_end: self.points[end].0,
            description,
        }
    }

    fn rule_beyond_three_sigma(&self, t: usize) -> Option<PatternMatch> {
        let value = self.points[t].1;
        let side = self.bands.beyond(value, 3.0)?;
        Some(self.make(
            PatternRule::BeyondThreeSigma,
            t,
            t,
            format!(
                "Value {} is {:.1}σ {} the mean ({:.2})",
                value,
                self.bands.sigmas(value).abs(),
                side.label(),
                self.bands.mean
            ),
        ))
    }

    /// `hits` of the last `window` points beyond `k` σ on the newest point's side
    fn rule_k_of_n(
        &self,
        t: usize,
        window: usize,
        hits: usize,
        k: f64,
        rule: PatternRule,
    ) -> Option<PatternMatch> {
        if t + 1 < window {
            return None;
        }
        let side = self.bands.beyond(self.points[t].1, k)?;
        let start = t + 1 - window;
        let count = self.points[start..=t]
            .iter()
            .filter(|&&(_, v)| self.bands.beyond(v, k) == Some(side))
            .count();
        if count < hits {
            return None;
        }
        Some(self.make(
            rule,
            start,
            t,
            format!(
                "{} of {} consecutive points beyond {}σ {} the mean",
                count,
                window,
                k,
                side.label()
            ),
        ))
    }

    fn scan(&self, mode: ScanMode) -> Vec<PatternMatch> {
        let mut matches = Vec::new();
        let mut side_run = 0usize;
        let mut run_side = Side::Center;
        let mut increases = 0usize;
        let mut decreases = 0usize;

        for t in 0..self.points.len() {
            let value = self.points[t].1;

            let side = self.bands.side(value);
            if side == Side::Center {
                side_run = 0;
            } else if side == run_side {
                side_run += 1;
            } else {
                side_run = 1;
            }
            run_side = side;

            if t > 0 {
                let prev = self.points[t - 1].1;
                if value > prev {
                    increases += 1;
                    decreases = 0;
                } else if value < prev {
                    decreases += 1;
                    increases = 0;
                } else {
                    increases = 0;
                    decreases = 0;
                }
            }

            let mut found: Vec<PatternMatch> = Vec::new();
            found.extend(self.rule_beyond_three_sigma(t));
            found.extend(self.rule_k_of_n(t, 3, 2, 2.0, PatternRule::TwoOfThreeBeyondTwoSigma));
            found.extend(self.rule_k_of_n(t, 5, 4, 1.0, PatternRule::FourOfFiveBeyondOneSigma));
            if side_run == self.same_side_run {
                found.push(self.make(
                    PatternRule::RunOnOneSide,
                    t + 1 - side_run,
                    t,
                    format!(
                        "{} consecutive points {} the mean",
                        side_run,
                        run_side.label()
                    ),
                ));
            }
            if increases == self.monotonic_run {
                found.push(self.make(
                    PatternRule::MonotonicRun,
                    t - increases,
                    t,
                    format!("{} consecutive increases", increases),
                ));
            }
            if decreases == self.monotonic_run {
                found.push(self.make(
                    PatternRule::MonotonicRun,
                    t - decreases,
                    t,
                    format!("{} consecutive decreases", decreases),
                ));
            }

            match mode {
                ScanMode::FirstMatch => {
                    if let Some(first) = found.into_iter().next() {
                        return vec![first];
                    }
                }
                ScanMode::Exhaustive => matches.extend(found),
            }
        }

        matches
    }
}

/// Run the rules over one series.
///
/// `ScanMode::FirstMatch` returns at most the earliest-triggering match;
/// `ScanMode::Exhaustive` returns every match in window order.
pub fn detect(
    series: &MetricSeries,
    profile: &SensitivityProfile,
    mode: ScanMode,
) -> Outcome<Vec<PatternMatch>> {
    let points = series.valid_points();
    if points.len() < MIN_OBSERVATIONS {
        return Outcome::Skipped(SkipReason::insufficient(MIN_OBSERVATIONS, points.len()));
    }

    let values: Vec<f64> = points.iter().map(|&(_, v)| v).collect();
    let (mean, sigma) = match (stats::mean(&values), stats::sample_std_dev(&values)) {
        (Some(m), Some(s)) => (m, s),
        _ => return Outcome::Skipped(SkipReason::insufficient(MIN_OBSERVATIONS, points.len())),
    };
    if sigma <= 0.0 {
        return Outcome::Skipped(SkipReason::degenerate("zero standard deviation"));
    }

    let scanner = Scanner {
        metric: series.name(),
        points: &points,
        bands: Bands { mean, sigma },
        same_side_run: profile.same_side_run.max(1),
        monotonic_run: profile.monotonic_run.max(1),
    };
    Outcome::Computed(scanner.scan(mode))
}
