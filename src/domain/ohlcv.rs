//! Daily bar representation and validated bar series.

use crate::domain::error::BottomscanError;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    fn check(&self) -> Result<(), String> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(format!("non-finite price on {}", self.date));
        }
        if self.high < self.low {
            return Err(format!(
                "high {} below low {} on {}",
                self.high, self.low, self.date
            ));
        }
        if self.close < self.low || self.close > self.high {
            return Err(format!(
                "close {} outside [{}, {}] on {}",
                self.close, self.low, self.high, self.date
            ));
        }
        Ok(())
    }
}

/// Ordered daily bars for one instrument.
///
/// Dates are strictly increasing and every bar satisfies
/// `low <= close <= high` with finite prices.
#[derive(Debug, Clone)]
pub struct BarSeries {
    code: String,
    bars: Vec<OhlcvBar>,
}

impl BarSeries {
    pub fn new(code: impl Into<String>, bars: Vec<OhlcvBar>) -> Result<Self, BottomscanError> {
        let code = code.into();
        let malformed = |reason: String| BottomscanError::MalformedSeries {
            code: code.clone(),
            reason,
        };

        for bar in &bars {
            bar.check().map_err(malformed)?;
        }
        for pair in bars.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(malformed(format!(
                    "dates not strictly increasing at {}",
                    pair[1].date
                )));
            }
        }

        Ok(Self { code, bars })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&OhlcvBar> {
        self.bars.last()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}
