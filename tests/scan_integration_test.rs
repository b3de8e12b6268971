//! Batch scan integration tests.
//!
//! Tests cover:
//! - Fault isolation across a mixed universe (MockDataPort)
//! - The fatal "no universe" path and its exact retry count
//! - Worker pool vs sequential equivalence and global request pacing
//! - Full scans over a CSV directory and a SQLite store on disk

mod common;

use bottomscan::adapters::csv_adapter::CsvAdapter;
use bottomscan::adapters::markdown_report::MarkdownReportAdapter;
use bottomscan::domain::error::BottomscanError;
use bottomscan::domain::scanner::{CancelToken, ScanConfig, Scanner};
use bottomscan::domain::signal::IndicatorEngine;
use bottomscan::ports::report_port::ReportPort;
use chrono::NaiveDate;
use common::*;
use std::fs;
use std::time::Duration;

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

fn test_config() -> ScanConfig {
    ScanConfig {
        lookback_days: 120,
        backoff_min: Duration::from_millis(10),
        backoff_max: Duration::from_millis(20),
        error_cooldown: Duration::from_millis(5),
        ..ScanConfig::new(as_of())
    }
}

fn scanner(config: ScanConfig) -> Scanner {
    Scanner::new(IndicatorEngine::default(), config)
}

mod fault_isolation {
    use super::*;

    #[test]
    fn failing_instruments_are_counted_and_skipped() {
        let mut port = MockDataPort::new();
        for i in 0..20 {
            let code = format!("{:06}", 600000 + i);
            port = if i % 5 == 0 {
                port.with_error(&code, "read timed out")
            } else {
                port.with_bars(&code, declining_bars(80))
            };
        }
        let pause = RecordingPause::new();
        let report = scanner(test_config())
            .scan(&port, &pause, &CancelToken::new())
            .unwrap();

        assert_eq!(report.total, 20);
        assert_eq!(report.scanned, 20);
        assert_eq!(report.failed, 4);
        assert_eq!(report.resonance.len(), 16);
        assert_eq!(port.fetch_calls(), 20);
        assert_eq!(pause.calls(), vec![Duration::from_millis(5); 4]);
    }

    #[test]
    fn every_instrument_failing_still_emits_a_report() {
        let port = MockDataPort::new()
            .with_error("A", "boom")
            .with_bars("B", vec![])
            .with_bars("C", flat_bars(10, 5.0));
        let report = scanner(test_config())
            .scan(&port, &RecordingPause::new(), &CancelToken::new())
            .unwrap();

        assert!(report.resonance.is_empty());
        assert!(report.watch.is_empty());
        assert_eq!(report.failed, 2);
        assert_eq!(report.insufficient, 1);
        assert_eq!(report.skipped(), 3);

        let md = MarkdownReportAdapter::new().render(&report);
        assert!(md.contains("No resonance today."));
        assert!(md.contains("| Failed | 2 |"));
    }
}

mod universe {
    use super::*;

    #[test]
    fn exhausted_retries_are_fatal_with_exact_attempt_count() {
        let port = MockDataPort::new()
            .with_bars("A", declining_bars(80))
            .failing_listing(usize::MAX);
        let pause = RecordingPause::new();
        let config = ScanConfig {
            universe_retries: 3,
            ..test_config()
        };
        let result = scanner(config).scan(&port, &pause, &CancelToken::new());

        match result {
            Err(BottomscanError::UniverseUnavailable {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("call 3"));
            }
            other => panic!("expected UniverseUnavailable, got {other:?}"),
        }
        assert_eq!(port.list_calls(), 3);
        assert_eq!(port.fetch_calls(), 0);

        let waits = pause.calls();
        assert_eq!(waits.len(), 2);
        for w in waits {
            assert!(w >= Duration::from_millis(10) && w <= Duration::from_millis(20));
        }
    }

    #[test]
    fn recovers_on_the_last_allowed_attempt() {
        let port = MockDataPort::new()
            .with_bars("A", declining_bars(80))
            .failing_listing(4);
        let report = scanner(test_config())
            .scan(&port, &RecordingPause::new(), &CancelToken::new())
            .unwrap();
        assert_eq!(port.list_calls(), 5);
        assert_eq!(report.resonance.len(), 1);
    }
}

mod worker_pool {
    use super::*;

    #[test]
    fn pooled_scan_matches_sequential_scan() {
        let mut port = MockDataPort::new();
        for i in 0..40 {
            let code = format!("{:06}", i);
            port = match i % 5 {
                0 => port.with_bars(&code, declining_bars(80)),
                1 => port.with_bars(&code, flat_bars(80, 12.5)),
                2 => port.with_error(&code, "reset by peer"),
                3 => port.with_bars(&code, crossing_bars(-0.01)),
                _ => port.with_bars(&code, rising_bars(80)),
            };
        }

        let sequential = scanner(test_config())
            .scan(&port, &RecordingPause::new(), &CancelToken::new())
            .unwrap();
        let pooled = scanner(ScanConfig {
            workers: 6,
            request_delay: Duration::from_millis(1),
            ..test_config()
        })
        .scan(&port, &RecordingPause::new(), &CancelToken::new())
        .unwrap();

        assert_eq!(pooled.resonance, sequential.resonance);
        assert_eq!(pooled.watch, sequential.watch);
        assert_eq!(pooled.failed, sequential.failed);
        assert_eq!(pooled.resonance.len(), 16);
        assert_eq!(pooled.watch.len(), 8);
        assert_eq!(pooled.failed, 8);
    }

    #[test]
    fn pooled_fetch_starts_are_spaced_by_request_delay() {
        let mut port = MockDataPort::new();
        for i in 0..8 {
            port = port.with_bars(&format!("{:06}", i), flat_bars(80, 10.0));
        }
        let delay = Duration::from_secs(3600);
        let pause = RecordingPause::new();
        let report = scanner(ScanConfig {
            workers: 4,
            request_delay: delay,
            ..test_config()
        })
        .scan(&port, &pause, &CancelToken::new())
        .unwrap();
        assert_eq!(report.scanned, 8);

        // the pause records instead of sleeping, so every wait is its slot's
        // offset from a start time only milliseconds after the first slot
        let mut waits = pause.calls();
        waits.sort();
        assert_eq!(waits.len(), 7);
        let slack = Duration::from_secs(60);
        for (k, wait) in waits.iter().enumerate() {
            let slot = delay * (k as u32 + 1);
            assert!(*wait <= slot && *wait + slack > slot, "wait {k}: {wait:?}");
        }
        for pair in waits.windows(2) {
            assert!(pair[1] - pair[0] + slack > delay);
        }
    }
}

mod on_disk {
    use super::*;

    fn seed_csv_dir(dir: &std::path::Path) {
        write_bars_csv(dir, "600519", &crossing_bars(-0.01));
        write_bars_csv(dir, "000001", &flat_bars(90, 11.0));
        write_bars_csv(dir, "300750", &rising_bars(90));
        write_bars_csv(dir, "688981", &flat_bars(20, 50.0));
        fs::write(
            dir.join("instruments.csv"),
            "code,name\n\
             600519,Kweichow Moutai\n\
             000001,Ping An Bank\n\
             300750,CATL\n\
             688981,SMIC\n\
             002594,BYD\n",
        )
        .unwrap();
    }

    #[test]
    fn csv_directory_scan() {
        let dir = tempfile::TempDir::new().unwrap();
        seed_csv_dir(dir.path());
        let port = CsvAdapter::new(dir.path().to_path_buf());

        let report = scanner(test_config())
            .scan(&port, &RecordingPause::new(), &CancelToken::new())
            .unwrap();

        assert_eq!(report.total, 5);
        assert_eq!(report.resonance.len(), 1);
        assert_eq!(report.resonance[0].code, "600519");
        assert_eq!(report.resonance[0].name, "Kweichow Moutai");
        assert_eq!(report.watch.len(), 1);
        assert_eq!(report.watch[0].code, "000001");
        assert_eq!(report.insufficient, 1);
        // 002594 has no bar file
        assert_eq!(report.failed, 1);

        let out = dir.path().join("report.md");
        MarkdownReportAdapter::new().write(&report, &out).unwrap();
        let md = fs::read_to_string(out).unwrap();
        assert!(md.contains("# Bottom signal scan: 2024-06-03"));
        assert!(md.contains("| 1 | 600519 | Kweichow Moutai |"));
    }

    #[test]
    fn as_of_before_the_slide_sees_no_signal() {
        let dir = tempfile::TempDir::new().unwrap();
        seed_csv_dir(dir.path());
        let port = CsvAdapter::new(dir.path().to_path_buf());

        // 2024-03-21 is the last bar before 600519 starts sliding
        let report = scanner(ScanConfig {
            as_of: NaiveDate::from_ymd_opt(2024, 3, 21).unwrap(),
            ..test_config()
        })
        .scan(&port, &RecordingPause::new(), &CancelToken::new())
        .unwrap();
        assert!(report.resonance.is_empty());
        let watch: Vec<_> = report.watch.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(watch, vec!["000001"]);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_store_scan_matches_csv_scan() {
        use bottomscan::adapters::sqlite_adapter::SqliteAdapter;
        use bottomscan::ports::data_port::MarketDataPort;

        let dir = tempfile::TempDir::new().unwrap();
        seed_csv_dir(dir.path());
        let csv = CsvAdapter::new(dir.path().to_path_buf());

        let store = SqliteAdapter::in_memory().unwrap();
        store.initialize_schema().unwrap();
        let listing = csv.list_instruments().unwrap();
        store.replace_instruments(&listing).unwrap();
        for instrument in &listing {
            if let Ok(bars) = csv.fetch_daily_bars(&instrument.code, as_of(), 1000) {
                store.insert_bars(&instrument.code, &bars).unwrap();
            }
        }

        let from_csv = scanner(test_config())
            .scan(&csv, &RecordingPause::new(), &CancelToken::new())
            .unwrap();
        let from_sqlite = scanner(test_config())
            .scan(&store, &RecordingPause::new(), &CancelToken::new())
            .unwrap();

        assert_eq!(from_sqlite.resonance, from_csv.resonance);
        assert_eq!(from_sqlite.watch, from_csv.watch);
        assert_eq!(from_sqlite.insufficient, from_csv.insufficient);
        assert_eq!(from_sqlite.failed, from_csv.failed);
    }
}
