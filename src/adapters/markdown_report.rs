//! Markdown report adapter implementing ReportPort.
//!
//! Renders a scan report as:
//! - a title with the scan date
//! - a resonance table, or a "no resonance today" line
//! - a watch table with an "… and N more" line when capped
//! - a counters table

use crate::domain::report::{ScanReport, SignalResult};
use crate::ports::report_port::ReportPort;

pub struct MarkdownReportAdapter;

impl MarkdownReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MarkdownReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_results_table(results: &[SignalResult]) -> String {
    let mut out = String::from("| # | Code | Name |\n|---|------|------|\n");
    for (i, r) in results.iter().enumerate() {
        out.push_str(&format!("| {} | {} | {} |\n", i + 1, r.code, escape_cell(&r.name)));
    }
    out
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn format_counters(report: &ScanReport) -> String {
    let mut out = String::from("| Metric | Count |\n|--------|-------|\n");
    for (label, value) in [
        ("Universe", report.total),
        ("Scanned", report.scanned),
        ("Evaluated", report.evaluated),
        ("Resonance", report.resonance.len()),
        ("Watch", report.watch_total()),
        ("Failed", report.failed),
        ("Insufficient data", report.insufficient),
        ("Anomalies", report.anomalies),
        ("Skipped", report.skipped()),
    ] {
        out.push_str(&format!("| {} | {} |\n", label, value));
    }
    out
}

impl ReportPort for MarkdownReportAdapter {
    fn render(&self, report: &ScanReport) -> String {
        let mut out = format!(
            "# Bottom signal scan: {}\n\n",
            report.scan_date.format("%Y-%m-%d")
        );

        if report.cancelled {
            out.push_str(&format!(
                "> Partial (cancelled): {} of {} instruments scanned.\n\n",
                report.scanned, report.total
            ));
        }

        out.push_str("## Resonance\n\n");
        if report.resonance.is_empty() {
            out.push_str("No resonance today.\n\n");
        } else {
            out.push_str(&format_results_table(&report.resonance));
            out.push('\n');
        }

        out.push_str("## Watch\n\n");
        if report.watch_total() == 0 {
            out.push_str("No watch candidates.\n\n");
        } else {
            out.push_str(&format_results_table(&report.watch));
            if report.watch_omitted > 0 {
                out.push_str(&format!("\n… and {} more\n", report.watch_omitted));
            }
            out.push('\n');
        }

        out.push_str("## Summary\n\n");
        out.push_str(&format_counters(report));
        out
    }
}
