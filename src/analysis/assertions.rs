//! CI gate assertions
//!
//! A comma-separated list of `selector comparator number` expressions:
//!
//! ```text
//! cycles<=10                  latest value
//! delta_cycles<=2             last minus first value in the window
//! trend_health_score>=0       signed Theil-Sen slope
//! ```
//!
//! Comparators: `<=`, `>=`, `<`, `>`, `==`, `!=`. The whole list is parsed
//! and every selector resolved before anything is evaluated; one bad
//! expression rejects the set.

use crate::models::{
    AssertionExpression, AssertionOutcome, Comparator, MetricReport, Selector,
};
use thiserror::Error;

/// Absolute tolerance for `==` and `!=`
pub const EQUALITY_TOLERANCE: f64 = 1e-9;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssertionError {
    #[error("Assertion list is empty")]
    Empty,

    #[error("Invalid assertion '{expression}': {reason}")]
    ParseError { expression: String, reason: String },

    #[error(
        "Unknown selector '{selector}'. Use <metric>, delta_<metric> or trend_<metric> with one of: {known}"
    )]
    UnknownSelector { selector: String, known: String },
}

fn malformed(expression: &str, reason: impl Into<String>) -> AssertionError {
    AssertionError::ParseError {
        expression: expression.to_string(),
        reason: reason.into(),
    }
}

/// Split one expression at its comparator.
fn split_expression(expr: &str) -> Result<(&str, Comparator, &str), AssertionError> {
    let Some(pos) = expr.find(['<', '>', '=', '!']) else {
        return Err(malformed(
            expr,
            "missing comparator (expected one of <=, >=, <, >, ==, !=)",
        ));
    };

    let rest = &expr[pos..];
    let (comparator, width) = if rest.starts_with("<=") {
        (Comparator::Le, 2)
    } else if rest.starts_with(">=") {
        (Comparator::Ge, 2)
    } else if rest.starts_with("==") {
        (Comparator::Eq, 2)
    } else if rest.starts_with("!=") {
        (Comparator::Ne, 2)
    } else if rest.starts_with('<') {
        (Comparator::Lt, 1)
    } else if rest.starts_with('>') {
        (Comparator::Gt, 1)
    } else {
        return Err(malformed(expr, format!("invalid comparator near '{}'", rest)));
    };

    Ok((&expr[..pos], comparator, &rest[width..]))
}

fn is_selector_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

/// Map a raw selector onto an analyzed metric.
///
/// An exact metric name wins over the `delta_`/`trend_` prefixes, so a
/// metric literally called `delta_x` stays addressable.
fn resolve_selector(raw: &str, metrics: &[String]) -> Result<Selector, AssertionError> {
    let known = |name: &str| metrics.iter().any(|m| m == name);

    if known(raw) {
        return Ok(Selector::Latest(raw.to_string()));
    }
    if let Some(metric) = raw.strip_prefix("delta_").filter(|m| known(m)) {
        return Ok(Selector::Delta(metric.to_string()));
    }
    if let Some(metric) = raw.strip_prefix("trend_").filter(|m| known(m)) {
        return Ok(Selector::Trend(metric.to_string()));
    }

    Err(AssertionError::UnknownSelector {
        selector: raw.to_string(),
        known: metrics.join(", "),
    })
}

/// Parse and resolve an assertion list against the analyzed metric names.
pub fn parse_assertions(
    input: &str,
    metrics: &[String],
) -> Result<Vec<AssertionExpression>, AssertionError> {
    if input.trim().is_empty() {
        return Err(AssertionError::Empty);
    }

    input
        .split(',')
        .map(|raw| {
            let expr = raw.trim();
            if expr.is_empty() {
                return Err(malformed(raw, "empty expression"));
            }

            let (lhs, comparator, rhs) = split_expression(expr)?;
            let lhs = lhs.trim();
            let rhs = rhs.trim();

            if lhs.is_empty() {
                return Err(malformed(expr, "missing selector"));
            }
            if !lhs.chars().all(is_selector_char) {
                return Err(malformed(expr, format!("invalid selector '{}'", lhs)));
            }
            let rhs: f64 = rhs
                .parse()
                .ok()
                .filter(|v: &f64| v.is_finite())
                .ok_or_else(|| malformed(expr, format!("'{}' is not a number", rhs)))?;

            Ok(AssertionExpression {
                selector: resolve_selector(lhs, metrics)?,
                comparator,
                rhs,
            })
        })
        .collect()
}

fn compare(observed: f64, comparator: Comparator, rhs: f64) -> bool {
    match comparator {
        Comparator::Le => observed <= rhs,
        Comparator::Ge => observed >= rhs,
        Comparator::Lt => observed < rhs,
        Comparator::Gt => observed > rhs,
        Comparator::Eq => (observed - rhs).abs() <= EQUALITY_TOLERANCE,
        Comparator::Ne => (observed - rhs).abs() > EQUALITY_TOLERANCE,
    }
}

fn observe(selector: &Selector, metrics: &[MetricReport]) -> Option<f64> {
    let report = metrics.iter().find(|m| m.metric == selector.metric())?;
    match selector {
        Selector::Latest(_) => report.latest,
        Selector::Delta(_) => report.delta,
        Selector::Trend(_) => report.trend.computed().map(|t| t.slope),
    }
}

/// Evaluate parsed expressions. A selector without a value (e.g. a trend
/// on fewer than four points) fails its expression.
pub fn evaluate_assertions(
    expressions: &[AssertionExpression],
    metrics: &[MetricReport],
) -> Vec<AssertionOutcome> {
    expressions
        .iter()
        .map(|expr| {
            let observed_value = observe(&expr.selector, metrics);
            AssertionOutcome {
                expression: expr.to_string(),
                observed_value,
                passed: observed_value
                    .is_some_and(|v| compare(v, expr.comparator, expr.rhs)),
            }
        })
        .collect()
}
