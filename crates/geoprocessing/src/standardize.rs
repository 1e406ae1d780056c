//! Min-max field standardization.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{GeoprocessingError, Result};

/// Output range of a min-max standardization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Standardization {
    pub min_value: f64,
    pub max_value: f64,
}

impl Default for Standardization {
    fn default() -> Self {
        Self {
            min_value: 1.0,
            max_value: 5.0,
        }
    }
}

impl Standardization {
    pub fn new(min_value: f64, max_value: f64) -> Result<Self> {
        let method = Self {
            min_value,
            max_value,
        };
        method.validate()?;
        Ok(method)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.min_value.is_finite() || !self.max_value.is_finite() || self.min_value >= self.max_value {
            return Err(GeoprocessingError::InvalidRange {
                min: self.min_value,
                max: self.max_value,
            });
        }
        Ok(())
    }
}

/// Scale non-null values linearly so the observed minimum maps to
/// `min_value` and the observed maximum to `max_value`.
///
/// Nulls stay null. When every non-null value is equal the range is zero
/// and all of them map to `min_value`.
pub fn standardize_values(values: &[Option<f64>], method: &Standardization) -> Result<Vec<Option<f64>>> {
    method.validate()?;

    let (lo, hi) = values
        .iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    if lo > hi {
        return Ok(vec![None; values.len()]);
    }

    let span = hi - lo;
    let out_span = method.max_value - method.min_value;

    if span == 0.0 {
        warn!(value = lo, "Zero-range field, standardizing to range minimum");
    }

    Ok(values
        .iter()
        .map(|v| {
            v.filter(|v| v.is_finite()).map(|v| {
                if span == 0.0 {
                    method.min_value
                } else {
                    method.min_value + (v - lo) / span * out_span
                }
            })
        })
        .collect())
}
