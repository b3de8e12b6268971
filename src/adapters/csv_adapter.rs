//! CSV directory data adapter.
//!
//! Layout:
//! - `instruments.csv`: `code,name`, one row per instrument, in scan order
//! - `<code>.csv`: `date,open,high,low,close,volume`, one row per session
//!
//! Without `instruments.csv` the universe is every `<code>.csv` in the
//! directory, sorted by code, with the code doubling as the name.

use crate::domain::error::BottomscanError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::universe::Instrument;
use crate::ports::data_port::MarketDataPort;
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub const INSTRUMENTS_FILE: &str = "instruments.csv";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }

    fn read_listing(&self, path: &PathBuf) -> Result<Vec<Instrument>, BottomscanError> {
        let mut rdr = csv::Reader::from_path(path).map_err(|e| BottomscanError::Provider {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut listing = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| BottomscanError::Provider {
                reason: format!("instrument listing parse error: {}", e),
            })?;
            let code = record.get(0).unwrap_or_default().trim();
            if code.is_empty() {
                continue;
            }
            let name = record.get(1).map(str::trim).unwrap_or(code);
            listing.push(Instrument::new(code, name));
        }
        Ok(listing)
    }

    fn scan_directory(&self) -> Result<Vec<Instrument>, BottomscanError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| BottomscanError::Provider {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut codes = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if name_str == INSTRUMENTS_FILE {
                continue;
            }
            if let Some(code) = name_str.strip_suffix(".csv") {
                codes.push(code.to_string());
            }
        }

        codes.sort();
        Ok(codes.into_iter().map(|c| Instrument::new(c.clone(), c)).collect())
    }
}

fn field<'a>(
    record: &'a csv::StringRecord,
    idx: usize,
    name: &str,
    code: &str,
) -> Result<&'a str, BottomscanError> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| BottomscanError::MalformedSeries {
            code: code.to_string(),
            reason: format!("missing {} column", name),
        })
}

fn price(record: &csv::StringRecord, idx: usize, name: &str, code: &str) -> Result<f64, BottomscanError> {
    field(record, idx, name, code)?
        .parse()
        .map_err(|e| BottomscanError::MalformedSeries {
            code: code.to_string(),
            reason: format!("invalid {} value: {}", name, e),
        })
}

impl MarketDataPort for CsvAdapter {
    fn list_instruments(&self) -> Result<Vec<Instrument>, BottomscanError> {
        let listing_path = self.base_path.join(INSTRUMENTS_FILE);
        if listing_path.exists() {
            self.read_listing(&listing_path)
        } else {
            self.scan_directory()
        }
    }

    fn fetch_daily_bars(
        &self,
        code: &str,
        as_of: NaiveDate,
        lookback: usize,
    ) -> Result<Vec<OhlcvBar>, BottomscanError> {
        let path = self.csv_path(code);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BottomscanError::NoData {
                    code: code.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| BottomscanError::MalformedSeries {
                code: code.to_string(),
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = field(&record, 0, "date", code)?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                BottomscanError::MalformedSeries {
                    code: code.to_string(),
                    reason: format!("invalid date format: {}", e),
                }
            })?;

            if date > as_of {
                continue;
            }

            let volume = match record.get(5).map(str::trim) {
                Some(v) if !v.is_empty() => v.parse::<f64>().map(|v| v as i64).map_err(|e| {
                    BottomscanError::MalformedSeries {
                        code: code.to_string(),
                        reason: format!("invalid volume value: {}", e),
                    }
                })?,
                _ => 0,
            };

            bars.push(OhlcvBar {
                date,
                open: price(&record, 1, "open", code)?,
                high: price(&record, 2, "high", code)?,
                low: price(&record, 3, "low", code)?,
                close: price(&record, 4, "close", code)?,
                volume,
            });
        }

        bars.sort_by_key(|b| b.date);
        let skip = bars.len().saturating_sub(lookback);
        Ok(bars.split_off(skip))
    }
}
