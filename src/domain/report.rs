//! Scan report: the tiered outcome of one scan run.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalResult {
    pub code: String,
    pub name: String,
    pub main: bool,
    pub sub: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanReport {
    pub scan_date: NaiveDate,
    /// Main and sub signal, in discovery order.
    pub resonance: Vec<SignalResult>,
    /// Main signal only, in discovery order, truncated to the display cap.
    pub watch: Vec<SignalResult>,
    /// Watch entries dropped by the display cap.
    pub watch_omitted: usize,
    /// Instruments in the universe.
    pub total: usize,
    /// Instruments processed (less than `total` only when cancelled).
    pub scanned: usize,
    pub evaluated: usize,
    /// Fetch errors, empty histories and malformed series.
    pub failed: usize,
    pub insufficient: usize,
    pub anomalies: usize,
    pub cancelled: bool,
}

impl ScanReport {
    pub fn skipped(&self) -> usize {
        self.failed + self.insufficient + self.anomalies
    }

    pub fn watch_total(&self) -> usize {
        self.watch.len() + self.watch_omitted
    }
}
