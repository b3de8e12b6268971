//! Range-position oscillators over a trailing high/low window.
//!
//! Both map the close into the window's [lowest low, highest high] range on a
//! 0..100 scale. A flat range (highest high == lowest low) has no defined
//! position and yields `None` instead of a division by zero.

use super::rolling::{rolling_max, rolling_min};

fn range_position(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    window: usize,
    measure: fn(f64, f64, f64) -> f64,
) -> Vec<Option<f64>> {
    let hhv = rolling_max(high, window);
    let llv = rolling_min(low, window);

    close
        .iter()
        .zip(hhv.iter().zip(llv.iter()))
        .map(|(&c, pair)| match pair {
            (Some(h), Some(l)) if h > l => {
                let v = measure(*h, *l, c);
                v.is_finite().then_some(v)
            }
            _ => None,
        })
        .collect()
}

/// Retail line: 100 × (HHV − close) / (HHV − LLV).
///
/// High when the close sits near the window's low.
pub fn retail_line(high: &[f64], low: &[f64], close: &[f64], window: usize) -> Vec<Option<f64>> {
    range_position(high, low, close, window, |h, l, c| 100.0 * (h - c) / (h - l))
}

/// Raw stochastic: 100 × (close − LLV) / (HHV − LLV).
pub fn stochastic(high: &[f64], low: &[f64], close: &[f64], window: usize) -> Vec<Option<f64>> {
    range_position(high, low, close, window, |h, l, c| 100.0 * (c - l) / (h - l))
}
