//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::OnceLock;
use tracing::warn;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::markdown_report::MarkdownReportAdapter;
use crate::adapters::thread_pause::ThreadPause;
use crate::domain::config_validation::{
    validate_data_config, validate_scan_config, validate_signal_config,
};
use crate::domain::error::BottomscanError;
use crate::domain::indicator::SmoothingConvention;
use crate::domain::ohlcv::BarSeries;
use crate::domain::scanner::{fetch_universe, CancelToken, ScanConfig, Scanner};
use crate::domain::signal::{IndicatorEngine, SignalOutcome, SignalParams, Tier};
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "bottomscan", about = "Daily-bar bottom signal scanner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan the instrument universe and emit the tiered report
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Evaluation date (YYYY-MM-DD), overrides [scan] as_of
        #[arg(long)]
        as_of: Option<String>,
        #[arg(long)]
        workers: Option<usize>,
        /// Comma-separated subset of the universe
        #[arg(long)]
        codes: Option<String>,
    },
    /// Evaluate one instrument and print its indicator state
    Inspect {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: String,
        #[arg(long)]
        as_of: Option<String>,
    },
    /// Print the instrument universe
    ListInstruments {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration and print the effective parameters
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Load a CSV data directory into the SQLite store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        from: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    run_with_cancel(cli, None)
}

/// Like [`run`]; a given `cancel` token replaces the Ctrl-C token a scan
/// would otherwise install.
pub fn run_with_cancel(cli: Cli, cancel: Option<CancelToken>) -> ExitCode {
    let result = match cli.command {
        Command::Scan {
            config,
            output,
            as_of,
            workers,
            codes,
        } => run_scan(
            &config,
            output.as_deref(),
            as_of.as_deref(),
            workers,
            codes.as_deref(),
            &cancel.unwrap_or_else(interrupt_token),
        ),
        Command::Inspect {
            config,
            code,
            as_of,
        } => run_inspect(&config, &code, as_of.as_deref()),
        Command::ListInstruments { config } => run_list_instruments(&config),
        Command::Validate { config } => run_validate(&config),
        Command::Import { config, from } => run_import(&config, &from),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match &e {
                BottomscanError::UniverseUnavailable { .. } => {
                    eprintln!("error: universe unavailable, no scan was performed ({e})");
                }
                _ => eprintln!("error: {e}"),
            }
            (&e).into()
        }
    }
}

static INTERRUPT: OnceLock<CancelToken> = OnceLock::new();

/// Process-wide token cancelled by the first Ctrl-C. A second Ctrl-C exits
/// immediately with status 130.
pub fn interrupt_token() -> CancelToken {
    INTERRUPT
        .get_or_init(|| {
            let token = CancelToken::new();
            let on_signal = token.clone();
            let installed = ctrlc::set_handler(move || {
                if on_signal.is_cancelled() {
                    std::process::exit(130);
                }
                on_signal.cancel();
                warn!("interrupt received, finishing in-flight instruments (Ctrl-C again to abort)");
            });
            if let Err(e) = installed {
                warn!(error = %e, "could not install Ctrl-C handler");
            }
            token
        })
        .clone()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, BottomscanError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), BottomscanError> {
    validate_data_config(config)?;
    validate_signal_config(config)?;
    validate_scan_config(config)
}

pub fn build_signal_params(config: &dyn ConfigPort) -> Result<SignalParams, BottomscanError> {
    let defaults = SignalParams::default();
    let trend_smoothing = match config.get_string("signal", "trend_smoothing") {
        Some(s) => s
            .parse::<SmoothingConvention>()
            .map_err(|reason| BottomscanError::ConfigInvalid {
                section: "signal".into(),
                key: "trend_smoothing".into(),
                reason,
            })?,
        None => defaults.trend_smoothing,
    };

    Ok(SignalParams {
        min_bars: config.get_count("signal", "min_bars", defaults.min_bars),
        trend_span: config.get_count("signal", "trend_span", defaults.trend_span),
        trend_smoothing,
        retail_window: config.get_count("signal", "retail_window", defaults.retail_window),
        retail_threshold: config.get_double(
            "signal",
            "retail_threshold",
            defaults.retail_threshold,
        ),
        stoch_window: config.get_count("signal", "stoch_window", defaults.stoch_window),
        fast_smoothing: config.get_count("signal", "fast_smoothing", defaults.fast_smoothing),
        slow_smoothing: config.get_count("signal", "slow_smoothing", defaults.slow_smoothing),
        price_trend_threshold: config.get_double(
            "signal",
            "price_trend_threshold",
            defaults.price_trend_threshold,
        ),
    })
}

fn parse_as_of(value: &str) -> Result<NaiveDate, BottomscanError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        BottomscanError::ConfigInvalid {
            section: "scan".into(),
            key: "as_of".into(),
            reason: "invalid date format (expected YYYY-MM-DD)".into(),
        }
    })
}

fn universe_retries(config: &dyn ConfigPort, default: u32) -> Result<u32, BottomscanError> {
    let retries = config.get_count("scan", "universe_retries", default as usize);
    u32::try_from(retries)
        .map(|n| n.max(1))
        .map_err(|_| BottomscanError::ConfigInvalid {
            section: "scan".into(),
            key: "universe_retries".into(),
            reason: format!("universe_retries must be at most {}", u32::MAX),
        })
}

/// Builds the scan config; `as_of` defaults to today when neither the
/// override nor `[scan] as_of` is set.
pub fn build_scan_config(
    config: &dyn ConfigPort,
    as_of_override: Option<&str>,
) -> Result<ScanConfig, BottomscanError> {
    let as_of = match as_of_override
        .map(str::to_string)
        .or_else(|| config.get_string("scan", "as_of"))
    {
        Some(s) => parse_as_of(&s)?,
        None => chrono::Local::now().date_naive(),
    };

    let defaults = ScanConfig::new(as_of);
    Ok(ScanConfig {
        lookback_days: config.get_count("scan", "lookback_days", defaults.lookback_days),
        universe_retries: universe_retries(config, defaults.universe_retries)?,
        backoff_min: config.get_millis("scan", "backoff_min_ms", 5000),
        backoff_max: config.get_millis("scan", "backoff_max_ms", 15000),
        request_delay: config.get_millis("scan", "request_delay_ms", 0),
        error_cooldown: config.get_millis("scan", "error_cooldown_ms", 2000),
        progress_interval: config.get_count(
            "scan",
            "progress_interval",
            defaults.progress_interval,
        ),
        workers: config.get_count("scan", "workers", defaults.workers).max(1),
        watch_cap: config.get_count("report", "watch_cap", defaults.watch_cap),
        ..defaults
    })
}

/// Codes to restrict the scan to: the override wins over `[scan] codes`.
pub fn resolve_codes(
    codes_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Option<Vec<String>>, BottomscanError> {
    let raw = match codes_override
        .map(str::to_string)
        .or_else(|| config.get_string("scan", "codes"))
    {
        Some(raw) => raw,
        None => return Ok(None),
    };
    parse_codes(&raw)
        .map(Some)
        .map_err(|e| BottomscanError::ConfigInvalid {
            section: "scan".into(),
            key: "codes".into(),
            reason: e.to_string(),
        })
}

pub fn open_data_port(config: &dyn ConfigPort) -> Result<Box<dyn MarketDataPort>, BottomscanError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());

    match source.as_str() {
        "csv" => {
            let path = config
                .get_string("data", "path")
                .ok_or_else(|| BottomscanError::ConfigMissing {
                    section: "data".into(),
                    key: "path".into(),
                })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(path))))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;

            let adapter = SqliteAdapter::from_config(config)?;
            adapter.initialize_schema()?;
            Ok(Box::new(adapter))
        }
        other => Err(BottomscanError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: format!("unsupported data source '{other}' in this build"),
        }),
    }
}

fn run_scan(
    config_path: &Path,
    output: Option<&Path>,
    as_of: Option<&str>,
    workers: Option<usize>,
    codes: Option<&str>,
    cancel: &CancelToken,
) -> Result<(), BottomscanError> {
    // Stage 1: Load and validate config
    let config = load_config(config_path)?;
    validate_config(&config)?;

    // Stage 2: Build engine and scan parameters
    let params = build_signal_params(&config)?;
    let mut scan_config = build_scan_config(&config, as_of)?;
    if let Some(w) = workers {
        scan_config.workers = w.max(1);
    }
    let codes = resolve_codes(codes, &config)?;

    // Stage 3: Fetch the universe (fatal on exhaustion)
    let port = open_data_port(&config)?;
    let pause = ThreadPause;
    let scanner = Scanner::new(IndicatorEngine::new(params), scan_config);
    let mut universe = fetch_universe(port.as_ref(), scanner.config(), &pause)?;

    if let Some(codes) = codes {
        let (restricted, missing) = universe.restrict(&codes);
        for code in &missing {
            warn!(code = %code, "code not in universe, ignored");
        }
        universe = restricted;
    }

    // Stage 4: Scan and emit the report
    let report = scanner.scan_universe(&universe, port.as_ref(), &pause, cancel);
    if report.cancelled {
        eprintln!(
            "Scan cancelled after {} of {} instruments; emitting partial report",
            report.scanned, report.total
        );
    }
    let renderer = MarkdownReportAdapter::new();
    let output = output
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("report", "output").map(PathBuf::from));

    match output {
        Some(path) => {
            renderer.write(&report, &path)?;
            eprintln!("Report written to: {}", path.display());
        }
        None => print!("{}", renderer.render(&report)),
    }
    Ok(())
}

fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn run_inspect(config_path: &Path, code: &str, as_of: Option<&str>) -> Result<(), BottomscanError> {
    let config = load_config(config_path)?;
    validate_config(&config)?;

    let engine = IndicatorEngine::new(build_signal_params(&config)?);
    let scan_config = build_scan_config(&config, as_of)?;
    let port = open_data_port(&config)?;

    let code = code.trim().to_string();
    let name = port
        .list_instruments()
        .ok()
        .and_then(|listing| listing.into_iter().find(|i| i.code == code))
        .map_or_else(|| code.clone(), |i| i.name);

    let bars = port.fetch_daily_bars(&code, scan_config.as_of, scan_config.lookback_days)?;
    if bars.is_empty() {
        return Err(BottomscanError::NoData { code });
    }
    let series = BarSeries::new(code.as_str(), bars)?;

    println!(
        "{} ({}) as of {}, {} bars",
        code,
        name,
        scan_config.as_of,
        series.len()
    );

    match engine.evaluate(&series) {
        SignalOutcome::Evaluated(signal) => {
            let state = &signal.state;
            println!("  trend line:      {:.4}", state.trend_line);
            println!("  low:             {:.4}", state.price_low);
            println!(
                "  retail line:     {} (prev {})",
                format_value(state.retail_line),
                format_value(state.prev_retail_line)
            );
            println!("  price trend:     {}", format_value(state.price_trend));
            println!("  main signal:     {}", yes_no(signal.main));
            println!("  retail cross:    {}", yes_no(signal.retail_cross));
            println!("  price oversold:  {}", yes_no(signal.price_trend_oversold));
            let tier = match signal.tier() {
                Some(Tier::Resonance) => "resonance",
                Some(Tier::Watch) => "watch",
                None => "none",
            };
            println!("  tier:            {}", tier);
        }
        SignalOutcome::InsufficientData { bars, minimum } => {
            println!("  insufficient data: {} bars, need {}", bars, minimum);
        }
        SignalOutcome::ComputationAnomaly { reason } => {
            println!("  computation anomaly: {}", reason);
        }
    }
    Ok(())
}

fn run_list_instruments(config_path: &Path) -> Result<(), BottomscanError> {
    let config = load_config(config_path)?;
    validate_data_config(&config)?;
    validate_scan_config(&config)?;

    let scan_config = build_scan_config(&config, None)?;
    let port = open_data_port(&config)?;
    let universe = fetch_universe(port.as_ref(), &scan_config, &ThreadPause)?;

    for instrument in universe.instruments() {
        println!("{}\t{}", instrument.code, instrument.name);
    }
    eprintln!("{} instruments found", universe.count());
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), BottomscanError> {
    let config = load_config(config_path)?;
    validate_config(&config)?;

    let params = build_signal_params(&config)?;
    let scan = build_scan_config(&config, None)?;
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());

    eprintln!("\nData:");
    eprintln!("  source: {}", source);

    eprintln!("\nSignal:");
    eprintln!("  min_bars:              {}", params.min_bars);
    eprintln!(
        "  trend line:            span {} ({})",
        params.trend_span, params.trend_smoothing
    );
    eprintln!(
        "  retail line:           window {}, cross below {}",
        params.retail_window, params.retail_threshold
    );
    eprintln!(
        "  price trend:           window {}, smoothing {}/{}, at or below {}",
        params.stoch_window,
        params.fast_smoothing,
        params.slow_smoothing,
        params.price_trend_threshold
    );

    eprintln!("\nScan:");
    eprintln!("  as_of:                 {}", scan.as_of);
    eprintln!("  lookback_days:         {}", scan.lookback_days);
    eprintln!(
        "  universe retries:      {} (backoff {}-{} ms)",
        scan.universe_retries,
        scan.backoff_min.as_millis(),
        scan.backoff_max.as_millis()
    );
    eprintln!("  request delay:         {} ms", scan.request_delay.as_millis());
    eprintln!("  error cooldown:        {} ms", scan.error_cooldown.as_millis());
    eprintln!("  workers:               {}", scan.workers);
    eprintln!("  watch cap:             {}", scan.watch_cap);

    if let Some(codes) = resolve_codes(None, &config)? {
        eprintln!("  codes:                 {}", codes.join(", "));
    }

    eprintln!("\nConfiguration is valid.");
    Ok(())
}

#[cfg(feature = "sqlite")]
fn run_import(config_path: &Path, from: &Path) -> Result<(), BottomscanError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let config = load_config(config_path)?;
    let store = SqliteAdapter::from_config(&config)?;
    store.initialize_schema()?;

    let source = CsvAdapter::new(from.to_path_buf());
    let listing = source.list_instruments()?;
    store.replace_instruments(&listing)?;

    let mut imported = 0usize;
    let mut bar_count = 0usize;
    for instrument in &listing {
        match source.fetch_daily_bars(&instrument.code, NaiveDate::MAX, usize::MAX) {
            Ok(bars) => {
                store.insert_bars(&instrument.code, &bars)?;
                imported += 1;
                bar_count += bars.len();
            }
            Err(e) => warn!(code = %instrument.code, error = %e, "skipping import"),
        }
    }

    eprintln!(
        "Imported {} bars for {}/{} instruments from {}",
        bar_count,
        imported,
        listing.len(),
        from.display()
    );
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn run_import(_config_path: &Path, _from: &Path) -> Result<(), BottomscanError> {
    Err(BottomscanError::ConfigInvalid {
        section: "data".into(),
        key: "source".into(),
        reason: "sqlite feature is required for import".into(),
    })
}
