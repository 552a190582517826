//! Export of scan and lookup results.
//!
//! Formats:
//! - CSV spreadsheets
//! - JSON

pub mod csv;

use crate::core::error::{Error, Result};
use crate::core::types::FileRecord;
use crate::reputation::item::LookupItem;
use std::path::Path;

pub use self::csv::{CsvExporter, LOOKUP_HEADERS, SCAN_HEADERS};

/// Report format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Json,
}

impl ReportFormat {
    /// Pick the format from a file extension; anything but `.json` is CSV.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ReportFormat::Json,
            _ => ReportFormat::Csv,
        }
    }
}

/// Export scanned files.
pub fn export_records(records: &[FileRecord], format: ReportFormat, output_path: &Path) -> Result<usize> {
    match format {
        ReportFormat::Csv => CsvExporter::new().export_records(records, output_path),
        ReportFormat::Json => write_json(records, output_path).map(|_| records.len()),
    }
}

/// Export lookup results.
pub fn export_lookups(items: &[LookupItem], format: ReportFormat, output_path: &Path) -> Result<usize> {
    match format {
        ReportFormat::Csv => CsvExporter::new().export_lookups(items, output_path),
        ReportFormat::Json => write_json(items, output_path).map(|_| items.len()),
    }
}

fn write_json<T: serde::Serialize + ?Sized>(value: &T, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(output_path, json).map_err(|e| Error::file_write(output_path, e))
}

/// Default export file name, e.g. `hash_results_20240501_120000.csv`.
pub fn default_file_name(prefix: &str, format: ReportFormat) -> String {
    let ext = match format {
        ReportFormat::Csv => "csv",
        ReportFormat::Json => "json",
    };
    format!(
        "{}_{}.{}",
        prefix,
        chrono::Local::now().format("%Y%m%d_%H%M%S"),
        ext
    )
}
