//! Trailing-window extrema. The window ends at (and includes) the current bar;
//! the first `window - 1` points are undefined.

fn rolling(values: &[f64], window: usize, pick: fn(f64, f64) -> f64) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                None
            } else {
                values[i + 1 - window..=i].iter().copied().reduce(pick)
            }
        })
        .collect()
}

pub fn rolling_max(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, f64::max)
}

pub fn rolling_min(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, f64::min)
}
