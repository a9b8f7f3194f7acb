//! Metrics measuring how far a benchmark row lies from a query point.
//!
//! The metric is fixed when a table is built; every metric returns a
//! non-negative value, zero meaning an exact hit. Non-finite results are
//! clamped to `f64::INFINITY` so ranking stays total.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TableError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Distance {
    /// Square root of summed squared differences.
    #[default]
    Euclidean,
    /// Sum of absolute differences.
    Manhattan,
    /// Sum of `(max + 1) / (min + 1) - 1` per coordinate. Penalises relative
    /// rather than absolute mismatch, so 64 vs 128 costs as much as 4096 vs 8192.
    Ratio,
    /// Sum of `|ln(1 + a) - ln(1 + b)|` per coordinate.
    Logarithmic,
    /// Per-coordinate weights applied on top of a base metric.
    Weighted { weights: Vec<f64>, inner: Box<Distance> },
}

impl Distance {
    pub fn weighted(weights: Vec<f64>, inner: Distance) -> Self {
        Distance::Weighted {
            weights,
            inner: Box::new(inner),
        }
    }

    /// Check the metric against a table of `dimensions` properties.
    pub fn validate(&self, dimensions: usize) -> Result<(), TableError> {
        match self {
            Distance::Weighted { weights, inner } => {
                if weights.len() != dimensions {
                    return Err(TableError::InvalidDistance(format!(
                        "{} weights for {dimensions} properties",
                        weights.len()
                    )));
                }
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(TableError::InvalidDistance(
                        "weights must be finite and non-negative".into(),
                    ));
                }
                if matches!(**inner, Distance::Weighted { .. }) {
                    return Err(TableError::InvalidDistance(
                        "weighted distance cannot wrap another weighted distance".into(),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Distance between a query point and a row key of equal length.
    pub fn evaluate(&self, query: &[f64], key: &[f64]) -> f64 {
        debug_assert_eq!(query.len(), key.len());
        let d = match self {
            Distance::Weighted { weights, inner } => {
                inner.accumulate(query, key, Some(weights.as_slice()))
            }
            other => other.accumulate(query, key, None),
        };
        if d.is_finite() {
            d.max(0.0)
        } else {
            f64::INFINITY
        }
    }

    fn accumulate(&self, query: &[f64], key: &[f64], weights: Option<&[f64]>) -> f64 {
        let weight = |i: usize| weights.map_or(1.0, |w| w[i]);
        let terms = query.iter().zip(key).enumerate();

        match self {
            Distance::Euclidean => terms
                .map(|(i, (a, b))| weight(i) * (a - b) * (a - b))
                .sum::<f64>()
                .sqrt(),
            Distance::Manhattan => terms.map(|(i, (a, b))| weight(i) * (a - b).abs()).sum(),
            Distance::Ratio => terms
                .map(|(i, (a, b))| {
                    let (a, b) = (non_negative(*a), non_negative(*b));
                    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
                    weight(i) * ((hi + 1.0) / (lo + 1.0) - 1.0)
                })
                .sum(),
            Distance::Logarithmic => terms
                .map(|(i, (a, b))| {
                    weight(i) * (non_negative(*a).ln_1p() - non_negative(*b).ln_1p()).abs()
                })
                .sum(),
            // Nesting is rejected by `validate`.
            Distance::Weighted { inner, .. } => inner.accumulate(query, key, weights),
        }
    }
}

/// Clamps negative coordinates to zero; NaN passes through.
fn non_negative(x: f64) -> f64 {
    if x < 0.0 { 0.0 } else { x }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distance::Euclidean => write!(f, "Euclidean"),
            Distance::Manhattan => write!(f, "Manhattan"),
            Distance::Ratio => write!(f, "Ratio"),
            Distance::Logarithmic => write!(f, "Logarithmic"),
            Distance::Weighted { weights, inner } => write!(f, "Weighted{weights:?}({inner})"),
        }
    }
}
