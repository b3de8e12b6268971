//! Configuration validation.
//!
//! Validates every config field before a scan runs.

use crate::domain::error::BottomscanError;
use crate::domain::indicator::SmoothingConvention;
use crate::domain::universe::parse_codes;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_signal_config(config: &dyn ConfigPort) -> Result<(), BottomscanError> {
    for (key, default) in [
        ("trend_span", 25),
        ("retail_window", 60),
        ("stoch_window", 27),
        ("fast_smoothing", 5),
        ("slow_smoothing", 3),
    ] {
        require_positive(config, "signal", key, default)?;
    }
    validate_min_bars(config)?;
    validate_trend_smoothing(config)?;
    for (key, default) in [("retail_threshold", 90.0), ("price_trend_threshold", 10.0)] {
        validate_percentage(config, key, default)?;
    }
    Ok(())
}

pub fn validate_scan_config(config: &dyn ConfigPort) -> Result<(), BottomscanError> {
    for (key, default) in [("universe_retries", 5), ("workers", 1)] {
        require_positive(config, "scan", key, default)?;
    }
    let retries = config.get_int("scan", "universe_retries", 5);
    if u32::try_from(retries).is_err() {
        return Err(invalid(
            "scan",
            "universe_retries",
            format!("universe_retries must be at most {}", u32::MAX),
        ));
    }
    for (key, default) in [
        ("request_delay_ms", 0),
        ("error_cooldown_ms", 2000),
        ("progress_interval", 200),
    ] {
        require_non_negative(config, "scan", key, default)?;
    }
    require_non_negative(config, "report", "watch_cap", 20)?;
    validate_lookback(config)?;
    validate_backoff(config)?;
    validate_as_of(config)?;
    validate_codes(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), BottomscanError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.trim() {
        "csv" => match config.get_string("data", "path") {
            Some(p) if !p.trim().is_empty() => Ok(()),
            _ => Err(BottomscanError::ConfigMissing {
                section: "data".to_string(),
                key: "path".to_string(),
            }),
        },
        "sqlite" => match config.get_string("sqlite", "path") {
            Some(p) if !p.trim().is_empty() => Ok(()),
            _ => Err(BottomscanError::ConfigMissing {
                section: "sqlite".to_string(),
                key: "path".to_string(),
            }),
        },
        other => Err(BottomscanError::ConfigInvalid {
            section: "data".to_string(),
            key: "source".to_string(),
            reason: format!("unknown data source '{other}' (expected csv or sqlite)"),
        }),
    }
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> BottomscanError {
    BottomscanError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn require_positive(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<(), BottomscanError> {
    if config.get_int(section, key, default) <= 0 {
        return Err(invalid(section, key, format!("{key} must be positive")));
    }
    Ok(())
}

fn require_non_negative(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<(), BottomscanError> {
    if config.get_int(section, key, default) < 0 {
        return Err(invalid(section, key, format!("{key} must be non-negative")));
    }
    Ok(())
}

fn validate_min_bars(config: &dyn ConfigPort) -> Result<(), BottomscanError> {
    let min_bars = config.get_int("signal", "min_bars", 65);
    let retail_window = config.get_int("signal", "retail_window", 60);
    let stoch_window = config.get_int("signal", "stoch_window", 27);

    if min_bars < retail_window + 1 {
        return Err(invalid(
            "signal",
            "min_bars",
            format!("min_bars must be at least retail_window + 1 ({})", retail_window + 1),
        ));
    }
    if min_bars < stoch_window {
        return Err(invalid(
            "signal",
            "min_bars",
            format!("min_bars must be at least stoch_window ({stoch_window})"),
        ));
    }
    Ok(())
}

fn validate_trend_smoothing(config: &dyn ConfigPort) -> Result<(), BottomscanError> {
    if let Some(value) = config.get_string("signal", "trend_smoothing") {
        value
            .parse::<SmoothingConvention>()
            .map_err(|reason| invalid("signal", "trend_smoothing", reason))?;
    }
    Ok(())
}

fn validate_percentage(config: &dyn ConfigPort, key: &str, default: f64) -> Result<(), BottomscanError> {
    let value = config.get_double("signal", key, default);
    if !(0.0..=100.0).contains(&value) {
        return Err(invalid("signal", key, format!("{key} must be between 0 and 100")));
    }
    Ok(())
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), BottomscanError> {
    let lookback = config.get_int("scan", "lookback_days", 80);
    let min_bars = config.get_int("signal", "min_bars", 65);
    if lookback < min_bars {
        return Err(invalid(
            "scan",
            "lookback_days",
            format!("lookback_days must be at least min_bars ({min_bars})"),
        ));
    }
    Ok(())
}

fn validate_backoff(config: &dyn ConfigPort) -> Result<(), BottomscanError> {
    let min = config.get_int("scan", "backoff_min_ms", 5000);
    let max = config.get_int("scan", "backoff_max_ms", 15000);
    if min < 0 {
        return Err(invalid("scan", "backoff_min_ms", "backoff_min_ms must be non-negative"));
    }
    if min > max {
        return Err(invalid(
            "scan",
            "backoff_min_ms",
            "backoff_min_ms must not exceed backoff_max_ms",
        ));
    }
    Ok(())
}

fn validate_as_of(config: &dyn ConfigPort) -> Result<(), BottomscanError> {
    if let Some(s) = config.get_string("scan", "as_of") {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|_| invalid("scan", "as_of", "invalid as_of format, expected YYYY-MM-DD"))?;
    }
    Ok(())
}

fn validate_codes(config: &dyn ConfigPort) -> Result<(), BottomscanError> {
    if let Some(codes) = config.get_string("scan", "codes") {
        parse_codes(&codes).map_err(|e| invalid("scan", "codes", e.to_string()))?;
    }
    Ok(())
}
