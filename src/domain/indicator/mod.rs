//! Indicator primitives used by the signal engine.
//!
//! Every primitive maps an input series to a series of the same length where
//! `None` marks a point with no defined value: a rolling window still warming
//! up, a zero-width high/low range, or a smoother that has not yet seen a
//! finite observation.
//!
//! - [`smoothing`]: exponential smoothing as an explicit streaming recurrence
//! - [`rolling`]: trailing window extrema
//! - [`oscillator`]: range-position oscillators built on the rolling extrema

pub mod oscillator;
pub mod rolling;
pub mod smoothing;

use std::fmt;
use std::str::FromStr;

/// How a smoothing length `n` maps to the recurrence factor α.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothingConvention {
    /// α = 2 / (n + 1), the conventional EMA span.
    Span,
    /// α = 1 / n, the recursive "SMA(X, n, 1)" weighting.
    Reciprocal,
}

impl SmoothingConvention {
    pub fn alpha(self, n: usize) -> f64 {
        match self {
            SmoothingConvention::Span => 2.0 / (n as f64 + 1.0),
            SmoothingConvention::Reciprocal => 1.0 / n as f64,
        }
    }
}

impl fmt::Display for SmoothingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmoothingConvention::Span => write!(f, "span"),
            SmoothingConvention::Reciprocal => write!(f, "reciprocal"),
        }
    }
}

impl FromStr for SmoothingConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "span" => Ok(SmoothingConvention::Span),
            "reciprocal" => Ok(SmoothingConvention::Reciprocal),
            other => Err(format!(
                "unknown smoothing convention '{other}' (expected span or reciprocal)"
            )),
        }
    }
}

/// Wraps a plain price series so it can feed the `Option`-based primitives.
pub fn defined(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().map(|&v| Some(v)).collect()
}
