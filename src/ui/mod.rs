//! User interface module.
//!
//! - `cli`: command-line interface
//! - `report`: CSV and JSON export

pub mod cli;
pub mod report;

pub use cli::{Cli, Commands, OutputFormat};
pub use report::{export_lookups, export_records, CsvExporter, ReportFormat};
