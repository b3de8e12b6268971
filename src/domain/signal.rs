//! Composite "bottom" signal evaluated at the most recent bar of a series.
//!
//! Main signal: the bar's low touches or breaches a trend line derived from
//! doubly smoothed highs and lows. Sub signal: either the retail line crosses
//! down through its threshold on this bar, or the smoothed price trend is
//! oversold. Only the last bar is ever reported.

use crate::domain::indicator::oscillator::{retail_line, stochastic};
use crate::domain::indicator::smoothing::{carry_forward, double_smooth, smooth};
use crate::domain::indicator::{SmoothingConvention, defined};
use crate::domain::ohlcv::BarSeries;

#[derive(Debug, Clone, PartialEq)]
pub struct SignalParams {
    pub min_bars: usize,
    pub trend_span: usize,
    pub trend_smoothing: SmoothingConvention,
    pub retail_window: usize,
    pub retail_threshold: f64,
    pub stoch_window: usize,
    pub fast_smoothing: usize,
    pub slow_smoothing: usize,
    pub price_trend_threshold: f64,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            min_bars: 65,
            trend_span: 25,
            trend_smoothing: SmoothingConvention::Span,
            retail_window: 60,
            retail_threshold: 90.0,
            stoch_window: 27,
            fast_smoothing: 5,
            slow_smoothing: 3,
            price_trend_threshold: 10.0,
        }
    }
}

/// Indicator values at the last bar. `None` means undefined at that point.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorState {
    pub trend_line: f64,
    pub price_low: f64,
    pub retail_line: Option<f64>,
    pub prev_retail_line: Option<f64>,
    pub price_trend: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Main and sub signal together.
    Resonance,
    /// Main signal only.
    Watch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub main: bool,
    pub retail_cross: bool,
    pub price_trend_oversold: bool,
    pub state: IndicatorState,
}

impl Signal {
    pub fn sub(&self) -> bool {
        self.retail_cross || self.price_trend_oversold
    }

    pub fn tier(&self) -> Option<Tier> {
        match (self.main, self.sub()) {
            (true, true) => Some(Tier::Resonance),
            (true, false) => Some(Tier::Watch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalOutcome {
    Evaluated(Signal),
    InsufficientData { bars: usize, minimum: usize },
    ComputationAnomaly { reason: String },
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    params: SignalParams,
}

impl IndicatorEngine {
    pub fn new(params: SignalParams) -> Self {
        Self { params }
    }

    /// Pure and deterministic: the same series always yields the same outcome.
    pub fn evaluate(&self, series: &BarSeries) -> SignalOutcome {
        let p = &self.params;
        let minimum = p.min_bars.max(1);
        if series.len() < minimum {
            return SignalOutcome::InsufficientData {
                bars: series.len(),
                minimum,
            };
        }

        let high = series.highs();
        let low = series.lows();
        let close = series.closes();
        let last = series.len() - 1;

        let alpha = p.trend_smoothing.alpha(p.trend_span);
        let smoothed_high = double_smooth(&defined(&high), alpha)[last];
        let smoothed_low = double_smooth(&defined(&low), alpha)[last];
        let trend_line = match (smoothed_high, smoothed_low) {
            (Some(h), Some(l)) => l - (h - l),
            _ => f64::NAN,
        };
        if !trend_line.is_finite() {
            return SignalOutcome::ComputationAnomaly {
                reason: format!("trend line is not finite for {}", series.code()),
            };
        }
        let price_low = low[last];

        let retail = retail_line(&high, &low, &close, p.retail_window);
        let retail_now = retail[last];
        let retail_prev = last.checked_sub(1).and_then(|i| retail[i]);
        let retail_cross = matches!(
            (retail_prev, retail_now),
            (Some(prev), Some(now)) if prev >= p.retail_threshold && now < p.retail_threshold
        );

        // the slow stage sees the fast line held across gaps; the price trend
        // itself stays undefined wherever the stochastic is
        let stoch = stochastic(&high, &low, &close, p.stoch_window);
        let fast = smooth(&stoch, SmoothingConvention::Reciprocal.alpha(p.fast_smoothing));
        let slow = smooth(
            &carry_forward(&fast),
            SmoothingConvention::Reciprocal.alpha(p.slow_smoothing),
        );
        let price_trend = match (fast[last], slow[last]) {
            (Some(f), Some(s)) => Some(3.0 * f - 2.0 * s).filter(|v| v.is_finite()),
            _ => None,
        };
        let price_trend_oversold = price_trend.is_some_and(|v| v <= p.price_trend_threshold);

        SignalOutcome::Evaluated(Signal {
            main: price_low <= trend_line,
            retail_cross,
            price_trend_oversold,
            state: IndicatorState {
                trend_line,
                price_low,
                retail_line: retail_now,
                prev_retail_line: retail_prev,
                price_trend,
            },
        })
    }
}
