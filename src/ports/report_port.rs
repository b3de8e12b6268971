//! Report rendering port trait.

use crate::domain::error::BottomscanError;
use crate::domain::report::ScanReport;
use std::fs;
use std::path::Path;

pub trait ReportPort {
    fn render(&self, report: &ScanReport) -> String;

    /// Default implementation: writes the rendered report to `output_path`.
    fn write(&self, report: &ScanReport, output_path: &Path) -> Result<(), BottomscanError> {
        fs::write(output_path, self.render(report))?;
        Ok(())
    }
}
