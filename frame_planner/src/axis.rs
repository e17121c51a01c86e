//! "Nice number" axis bounds.
//!
//! Charts in a sliding-window run keep their y-axis pinned for the whole video,
//! so the bounds are computed once from the full series and rounded outward to
//! a clean step of 1, 2, 3 or 5 × 10^k.

use serde::Serialize;

use crate::errors::PlanError;

/// Default number of axis splits for price panes.
pub const PRICE_SPLIT_COUNT: u32 = 5;
/// Default number of axis splits for the volume pane.
pub const VOLUME_SPLIT_COUNT: u32 = 2;

/// Inclusive axis range, `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisBounds {
    pub max: f64,
    pub min: f64,
}

impl AxisBounds {
    /// Smallest bounds containing both `self` and `other`.
    pub fn union(self, other: AxisBounds) -> AxisBounds {
        AxisBounds {
            max: self.max.max(other.max),
            min: self.min.min(other.min),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Snaps a positive step to 1, 2, 3, 5 or 10 times its power of ten.
pub fn nice(val: f64) -> f64 {
    let exponent = val.abs().log10().floor() as i32;
    let exp10 = 10f64.powi(exponent);
    let f = val / exp10;

    let nf = if f < 1.5 {
        1.0
    } else if f < 2.5 {
        2.0
    } else if f < 4.0 {
        3.0
    } else if f < 7.0 {
        5.0
    } else {
        10.0
    };
    nf * exp10
}

/// Number of significant decimal places in `interval` (at most 10).
pub fn interval_precision(interval: f64) -> u32 {
    let formatted = format!("{interval:.10}");
    let trimmed = formatted.trim_end_matches('0');
    match trimmed.split_once('.') {
        Some((_, frac)) => frac.len() as u32,
        None => 0,
    }
}

/// Rounds half to even at `precision` decimal places.
pub fn round_number(value: f64, precision: u32) -> f64 {
    if precision == 0 {
        return value.round_ties_even();
    }
    let scale = 10f64.powi(precision as i32);
    (value * scale).round_ties_even() / scale
}

/// Computes rounded bounds with `min <= min_value <= max_value <= max`.
///
/// A zero span (`max_value == min_value`) yields a band of one interval on each
/// side, the interval being `nice(|v| / split_count)` or `1.0` when `v == 0`.
pub fn scale_nice_val(max_value: f64, min_value: f64, split_count: u32) -> Result<AxisBounds, PlanError> {
    if !max_value.is_finite() || !min_value.is_finite() || max_value < min_value || split_count == 0 {
        return Err(PlanError::InvalidAxisInput {
            max: max_value,
            min: min_value,
            split_count,
        });
    }

    let span = max_value - min_value;
    if span == 0.0 {
        let interval = if max_value == 0.0 {
            1.0
        } else {
            nice(max_value.abs() / split_count as f64)
        };
        let precision = interval_precision(interval);
        return Ok(AxisBounds {
            max: round_number(max_value + interval, precision).max(max_value),
            min: round_number(min_value - interval, precision).min(min_value),
        });
    }

    let interval = nice(span / split_count as f64);
    let precision = interval_precision(interval);

    let nice_max = round_number((max_value / interval).ceil() * interval, precision);
    let nice_min = round_number((min_value / interval).floor() * interval, precision);

    Ok(AxisBounds {
        max: nice_max.max(max_value),
        min: nice_min.min(min_value),
    })
}
