//! Exponential smoothing.
//!
//! s[t] = s[t-1] + α·(x[t] − s[t-1]), seeded with the first finite
//! observation. Undefined inputs yield an undefined output. Weights follow
//! absolute positions: each undefined point between two observations shrinks
//! the weight of the previous state by another (1 − α), so
//! `[x0, None, x2]` smooths to `((1 − α)²·x0 + α·x2) / ((1 − α)² + α)`.

#[derive(Debug, Clone)]
pub struct Smoother {
    alpha: f64,
    state: Option<f64>,
    gaps: i32,
}

impl Smoother {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            state: None,
            gaps: 0,
        }
    }

    pub fn update(&mut self, value: Option<f64>) -> Option<f64> {
        let Some(x) = value.filter(|v| v.is_finite()) else {
            if self.state.is_some() {
                self.gaps = self.gaps.saturating_add(1);
            }
            return None;
        };
        let next = match self.state {
            None => x,
            Some(prev) if self.gaps == 0 => prev + self.alpha * (x - prev),
            Some(prev) => {
                let old = (1.0 - self.alpha).powi(self.gaps.saturating_add(1));
                (old * prev + self.alpha * x) / (old + self.alpha)
            }
        };
        self.state = Some(next);
        self.gaps = 0;
        Some(next)
    }
}

pub fn smooth(values: &[Option<f64>], alpha: f64) -> Vec<Option<f64>> {
    let mut smoother = Smoother::new(alpha);
    values.iter().map(|&v| smoother.update(v)).collect()
}

/// Applies [`smooth`] twice with the same factor.
pub fn double_smooth(values: &[Option<f64>], alpha: f64) -> Vec<Option<f64>> {
    smooth(&smooth(values, alpha), alpha)
}

/// Repeats the last defined value over later undefined points. Leading
/// undefined points stay undefined.
pub fn carry_forward(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut last = None;
    values
        .iter()
        .map(|&v| {
            if v.is_some() {
                last = v;
            }
            last
        })
        .collect()
}
