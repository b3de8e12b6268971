//! Market data port trait.

use crate::domain::error::BottomscanError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::universe::Instrument;
use chrono::NaiveDate;

/// Upstream source of the instrument universe and daily bars.
///
/// Implementations are shared across scan workers, hence `Send + Sync`.
pub trait MarketDataPort: Send + Sync {
    /// Lists every instrument eligible for a scan, in provider order.
    fn list_instruments(&self) -> Result<Vec<Instrument>, BottomscanError>;

    /// Returns up to `lookback` most recent daily bars dated on or before
    /// `as_of`, ascending by date.
    fn fetch_daily_bars(
        &self,
        code: &str,
        as_of: NaiveDate,
        lookback: usize,
    ) -> Result<Vec<OhlcvBar>, BottomscanError>;
}
