#![allow(dead_code)]

use bottomscan::domain::error::BottomscanError;
use bottomscan::domain::indicator::smoothing::{double_smooth, smooth};
use bottomscan::domain::indicator::{defined, SmoothingConvention};
pub use bottomscan::domain::ohlcv::OhlcvBar;
use bottomscan::domain::universe::Instrument;
use bottomscan::ports::data_port::MarketDataPort;
use bottomscan::ports::pause_port::PausePort;
use chrono::{Duration as Days, NaiveDate};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub struct MockDataPort {
    pub listing: Vec<Instrument>,
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
    /// Listing calls that fail before the listing is served.
    pub list_failures: usize,
    pub list_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            listing: Vec::new(),
            data: HashMap::new(),
            errors: HashMap::new(),
            list_failures: 0,
            list_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<OhlcvBar>) -> Self {
        self.listing.push(Instrument::new(code, format!("{code} Holdings")));
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.listing.push(Instrument::new(code, format!("{code} Holdings")));
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }

    pub fn failing_listing(mut self, failures: usize) -> Self {
        self.list_failures = failures;
        self
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl MarketDataPort for MockDataPort {
    fn list_instruments(&self) -> Result<Vec<Instrument>, BottomscanError> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.list_failures {
            return Err(BottomscanError::Provider {
                reason: format!("listing endpoint unavailable (call {})", call + 1),
            });
        }
        Ok(self.listing.clone())
    }

    fn fetch_daily_bars(
        &self,
        code: &str,
        _as_of: NaiveDate,
        _lookback: usize,
    ) -> Result<Vec<OhlcvBar>, BottomscanError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.errors.get(code) {
            return Err(BottomscanError::Provider {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(code).cloned().unwrap_or_default())
    }
}

/// Records requested waits instead of sleeping.
pub struct RecordingPause(Mutex<Vec<Duration>>);

impl RecordingPause {
    pub fn new() -> Self {
        Self(Mutex::new(Vec::new()))
    }

    pub fn calls(&self) -> Vec<Duration> {
        self.0.lock().unwrap().clone()
    }
}

impl PausePort for RecordingPause {
    fn pause(&self, duration: Duration) {
        self.0.lock().unwrap().push(duration);
    }
}

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

pub fn make_bars(hlc: &[(f64, f64, f64)]) -> Vec<OhlcvBar> {
    hlc.iter()
        .enumerate()
        .map(|(i, &(high, low, close))| OhlcvBar {
            date: start_date() + Days::days(i as i64),
            open: close,
            high,
            low,
            close,
            volume: 10_000,
        })
        .collect()
}

/// Constant prices: the low sits exactly on the trend line.
pub fn flat_bars(n: usize, price: f64) -> Vec<OhlcvBar> {
    make_bars(&vec![(price, price, price); n])
}

/// Steady decline closing on the low.
pub fn declining_bars(n: usize) -> Vec<OhlcvBar> {
    let hlc: Vec<_> = (0..n)
        .map(|i| {
            let c = 200.0 - i as f64;
            (c + 2.0, c, c)
        })
        .collect();
    make_bars(&hlc)
}

pub fn rising_bars(n: usize) -> Vec<OhlcvBar> {
    let hlc: Vec<_> = (0..n)
        .map(|i| {
            let c = 50.0 + i as f64;
            (c + 1.0, c - 1.0, c)
        })
        .collect();
    make_bars(&hlc)
}

/// 90 bars ending on a bar where the retail line crosses down through 90,
/// the price trend is oversold, and the low sits `low_offset` away from the
/// trend line (negative: below it).
///
/// Bars 0..=80 range 145..255 around 200, bars 81..=88 slide to 55 (bar 88
/// wicks down to 40), and the last close is placed at 89% of the 60-bar range
/// so the retail line reads exactly 89.
pub fn crossing_bars(low_offset: f64) -> Vec<OhlcvBar> {
    let mut hlc: Vec<(f64, f64, f64)> = vec![(255.0, 145.0, 200.0); 81];
    for k in 1..=8 {
        let c = 200.0 + (55.0 - 200.0) * k as f64 / 8.0;
        hlc.push((c + 5.0, c - 5.0, c));
    }
    hlc[88].1 = 40.0;

    let highs: Vec<f64> = hlc.iter().map(|b| b.0).collect();
    let lows: Vec<f64> = hlc.iter().map(|b| b.1).collect();
    let hhv = highs[highs.len() - 59..].iter().cloned().fold(f64::MIN, f64::max);
    let llv = lows[lows.len() - 59..].iter().cloned().fold(f64::MAX, f64::min);
    let close = hhv - 0.89 * (hhv - llv);
    let high = close + 2.0;

    // trend = 2·sL − sH is linear in the final low; solve low == trend
    let alpha = SmoothingConvention::Span.alpha(25);
    let e1 = smooth(&defined(&lows), alpha);
    let e2 = smooth(&e1, alpha);
    let e1_prev = e1[e1.len() - 1].unwrap();
    let e2_prev = e2[e2.len() - 1].unwrap();
    let mut all_highs = highs.clone();
    all_highs.push(high);
    let smoothed_high = double_smooth(&defined(&all_highs), alpha)[all_highs.len() - 1].unwrap();
    let boundary = (2.0 * (alpha * (1.0 - alpha) * e1_prev + (1.0 - alpha) * e2_prev)
        - smoothed_high)
        / (1.0 - 2.0 * alpha * alpha);

    hlc.push((high, boundary + low_offset, close));
    make_bars(&hlc)
}

pub fn write_bars_csv(dir: &Path, code: &str, bars: &[OhlcvBar]) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date.format("%Y-%m-%d"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    fs::write(dir.join(format!("{code}.csv")), content).unwrap();
}
