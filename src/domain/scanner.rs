//! Batch scan over the instrument universe.
//!
//! Stages:
//! 1. Fetch the universe, retrying with randomised backoff. Exhausting the
//!    retries is the only fatal outcome of a scan.
//! 2. For each instrument: fetch bars, validate, evaluate, classify. Any
//!    instrument-local failure is counted and the scan moves on.
//! 3. Finalize the report in universe order.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::domain::error::BottomscanError;
use crate::domain::ohlcv::BarSeries;
use crate::domain::report::{ScanReport, SignalResult};
use crate::domain::signal::{IndicatorEngine, SignalOutcome, Tier};
use crate::domain::universe::{Instrument, Universe};
use crate::ports::data_port::MarketDataPort;
use crate::ports::pause_port::PausePort;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub as_of: NaiveDate,
    /// Bars requested per instrument.
    pub lookback_days: usize,
    /// Total universe fetch attempts, including the first.
    pub universe_retries: u32,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    /// Spacing between instrument fetches.
    pub request_delay: Duration,
    /// Extra wait after a transient fetch error.
    pub error_cooldown: Duration,
    pub progress_interval: usize,
    pub workers: usize,
    pub watch_cap: usize,
}

impl ScanConfig {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            as_of,
            lookback_days: 80,
            universe_retries: 5,
            backoff_min: Duration::from_secs(5),
            backoff_max: Duration::from_secs(15),
            request_delay: Duration::ZERO,
            error_cooldown: Duration::from_secs(2),
            progress_interval: 200,
            workers: 1,
            watch_cap: 20,
        }
    }

    fn backoff(&self) -> Duration {
        if self.backoff_max <= self.backoff_min {
            return self.backoff_min;
        }
        let lo = self.backoff_min.as_millis() as u64;
        let hi = self.backoff_max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }
}

/// Cooperative cancellation flag, checked before each instrument.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of processing a single instrument.
#[derive(Debug, Clone, PartialEq)]
pub enum InstrumentOutcome {
    Classified(Tier),
    NoSignal,
    Failed,
    Insufficient,
    Anomaly,
}

/// Per-run accumulator threaded through the instrument loop.
#[derive(Debug)]
pub struct ScanContext {
    scan_date: NaiveDate,
    total: usize,
    scanned: usize,
    evaluated: usize,
    failed: usize,
    insufficient: usize,
    anomalies: usize,
    resonance: Vec<SignalResult>,
    watch: Vec<SignalResult>,
}

impl ScanContext {
    pub fn new(scan_date: NaiveDate, total: usize) -> Self {
        Self {
            scan_date,
            total,
            scanned: 0,
            evaluated: 0,
            failed: 0,
            insufficient: 0,
            anomalies: 0,
            resonance: Vec::new(),
            watch: Vec::new(),
        }
    }

    pub fn record(&mut self, instrument: &Instrument, outcome: &InstrumentOutcome) {
        self.scanned += 1;
        let result = |main, sub| SignalResult {
            code: instrument.code.clone(),
            name: instrument.name.clone(),
            main,
            sub,
        };
        match outcome {
            InstrumentOutcome::Classified(Tier::Resonance) => {
                self.evaluated += 1;
                self.resonance.push(result(true, true));
            }
            InstrumentOutcome::Classified(Tier::Watch) => {
                self.evaluated += 1;
                self.watch.push(result(true, false));
            }
            InstrumentOutcome::NoSignal => self.evaluated += 1,
            InstrumentOutcome::Failed => self.failed += 1,
            InstrumentOutcome::Insufficient => self.insufficient += 1,
            InstrumentOutcome::Anomaly => self.anomalies += 1,
        }
    }

    pub fn finish(mut self, watch_cap: usize, cancelled: bool) -> ScanReport {
        let watch_omitted = self.watch.len().saturating_sub(watch_cap);
        self.watch.truncate(watch_cap);
        ScanReport {
            scan_date: self.scan_date,
            resonance: self.resonance,
            watch: self.watch,
            watch_omitted,
            total: self.total,
            scanned: self.scanned,
            evaluated: self.evaluated,
            failed: self.failed,
            insufficient: self.insufficient,
            anomalies: self.anomalies,
            cancelled,
        }
    }
}

/// Spaces request starts across workers so the aggregate rate stays at one
/// fetch per `delay`.
struct PacingGate {
    delay: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl PacingGate {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: Mutex::new(None),
        }
    }

    /// Claims the next start slot and returns how long to wait for it.
    fn reserve(&self, now: Instant) -> Duration {
        let mut slot = self.next_slot.lock().unwrap_or_else(PoisonError::into_inner);
        let start = slot.map_or(now, |s| s.max(now));
        *slot = Some(start + self.delay);
        start - now
    }

    fn wait(&self, pause: &dyn PausePort) {
        if self.delay.is_zero() {
            return;
        }
        let wait = self.reserve(Instant::now());
        if !wait.is_zero() {
            pause.pause(wait);
        }
    }
}

/// Fetches the universe, retrying up to `universe_retries` attempts in total.
pub fn fetch_universe(
    port: &dyn MarketDataPort,
    config: &ScanConfig,
    pause: &dyn PausePort,
) -> Result<Universe, BottomscanError> {
    let attempts = config.universe_retries.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match port.list_instruments() {
            Ok(listing) if !listing.is_empty() => {
                let universe = Universe::from_listing(listing);
                info!(instruments = universe.count(), attempt, "instrument universe loaded");
                return Ok(universe);
            }
            Ok(_) => last_error = "empty instrument listing".to_string(),
            Err(e) => last_error = e.to_string(),
        }

        if attempt < attempts {
            let delay = config.backoff();
            warn!(
                attempt,
                attempts,
                error = %last_error,
                retry_in_ms = delay.as_millis() as u64,
                "universe fetch failed, retrying"
            );
            pause.pause(delay);
        } else {
            warn!(attempt, attempts, error = %last_error, "universe fetch failed");
        }
    }

    Err(BottomscanError::UniverseUnavailable {
        attempts,
        last_error,
    })
}

pub struct Scanner {
    engine: IndicatorEngine,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(engine: IndicatorEngine, config: ScanConfig) -> Self {
        Self { engine, config }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Runs a full scan. Returns `UniverseUnavailable` when the universe
    /// cannot be fetched; every other failure is absorbed per instrument.
    pub fn scan(
        &self,
        port: &dyn MarketDataPort,
        pause: &dyn PausePort,
        cancel: &CancelToken,
    ) -> Result<ScanReport, BottomscanError> {
        let universe = fetch_universe(port, &self.config, pause)?;
        Ok(self.scan_universe(&universe, port, pause, cancel))
    }

    /// Scans an already fetched universe.
    pub fn scan_universe(
        &self,
        universe: &Universe,
        port: &dyn MarketDataPort,
        pause: &dyn PausePort,
        cancel: &CancelToken,
    ) -> ScanReport {
        let total = universe.count();
        info!(
            total,
            workers = self.config.workers,
            as_of = %self.config.as_of,
            "scan started"
        );

        let outcomes = if self.config.workers > 1 && total > 1 {
            self.run_pool(universe, port, pause, cancel)
        } else {
            self.run_sequential(universe, port, pause, cancel)
        };

        let mut ctx = ScanContext::new(self.config.as_of, total);
        for (idx, outcome) in &outcomes {
            ctx.record(&universe.instruments()[*idx], outcome);
        }
        let cancelled = cancel.is_cancelled() && outcomes.len() < total;
        let report = ctx.finish(self.config.watch_cap, cancelled);

        info!(
            scanned = report.scanned,
            total = report.total,
            resonance = report.resonance.len(),
            watch = report.watch_total(),
            failed = report.failed,
            insufficient = report.insufficient,
            anomalies = report.anomalies,
            cancelled = report.cancelled,
            "scan finished"
        );
        report
    }

    fn run_sequential(
        &self,
        universe: &Universe,
        port: &dyn MarketDataPort,
        pause: &dyn PausePort,
        cancel: &CancelToken,
    ) -> Vec<(usize, InstrumentOutcome)> {
        let total = universe.count();
        let mut outcomes = Vec::with_capacity(total);

        for (idx, instrument) in universe.instruments().iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(processed = idx, total, "scan cancelled");
                break;
            }
            if idx > 0 && !self.config.request_delay.is_zero() {
                pause.pause(self.config.request_delay);
            }
            outcomes.push((idx, self.scan_instrument(instrument, port, pause)));
            self.report_progress(idx + 1, total);
        }

        outcomes
    }

    fn run_pool(
        &self,
        universe: &Universe,
        port: &dyn MarketDataPort,
        pause: &dyn PausePort,
        cancel: &CancelToken,
    ) -> Vec<(usize, InstrumentOutcome)> {
        let total = universe.count();
        let next = AtomicUsize::new(0);
        let processed = AtomicUsize::new(0);
        let gate = PacingGate::new(self.config.request_delay);
        let results = Mutex::new(Vec::with_capacity(total));

        thread::scope(|scope| {
            for _ in 0..self.config.workers.min(total) {
                scope.spawn(|| {
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let idx = next.fetch_add(1, Ordering::SeqCst);
                        let Some(instrument) = universe.instruments().get(idx) else {
                            break;
                        };
                        gate.wait(pause);
                        let outcome = self.scan_instrument(instrument, port, pause);
                        results
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push((idx, outcome));
                        let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
                        self.report_progress(done, total);
                    }
                });
            }
        });

        let mut outcomes = results.into_inner().unwrap_or_else(PoisonError::into_inner);
        outcomes.sort_by_key(|(idx, _)| *idx);
        if cancel.is_cancelled() {
            warn!(processed = outcomes.len(), total, "scan cancelled");
        }
        outcomes
    }

    fn report_progress(&self, done: usize, total: usize) {
        let every = self.config.progress_interval;
        if every > 0 && done % every == 0 {
            info!("progress: {}/{}", done, total);
        }
    }

    fn scan_instrument(
        &self,
        instrument: &Instrument,
        port: &dyn MarketDataPort,
        pause: &dyn PausePort,
    ) -> InstrumentOutcome {
        let code = instrument.code.as_str();
        let bars = match port.fetch_daily_bars(code, self.config.as_of, self.config.lookback_days)
        {
            Ok(bars) => bars,
            Err(e) => {
                warn!(code, error = %e, "history fetch failed, skipping");
                if e.is_transient() && !self.config.error_cooldown.is_zero() {
                    pause.pause(self.config.error_cooldown);
                }
                return InstrumentOutcome::Failed;
            }
        };

        if bars.is_empty() {
            warn!(code, "empty history, skipping");
            return InstrumentOutcome::Failed;
        }

        let series = match BarSeries::new(code, bars) {
            Ok(s) => s,
            Err(e) => {
                warn!(code, error = %e, "malformed history, skipping");
                return InstrumentOutcome::Failed;
            }
        };

        match self.engine.evaluate(&series) {
            SignalOutcome::Evaluated(signal) => match signal.tier() {
                Some(tier) => {
                    match tier {
                        Tier::Resonance => info!(code, name = %instrument.name, "resonance"),
                        Tier::Watch => debug!(code, name = %instrument.name, "watch"),
                    }
                    InstrumentOutcome::Classified(tier)
                }
                None => InstrumentOutcome::NoSignal,
            },
            SignalOutcome::InsufficientData { bars, minimum } => {
                debug!(code, bars, minimum, "insufficient history");
                InstrumentOutcome::Insufficient
            }
            SignalOutcome::ComputationAnomaly { reason } => {
                warn!(code, reason = %reason, "indicator anomaly");
                InstrumentOutcome::Anomaly
            }
        }
    }
}
