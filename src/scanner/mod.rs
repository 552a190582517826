//! File discovery and hashing.
//!
//! This module provides the scan-and-hash pipeline:
//! - Directory walking and explicit file lists
//! - A controlled hashing worker with pause/resume/stop
//! - Progress tracking and reporting
//! - The in-memory result table

pub mod controller;
pub mod enumerate;
pub mod progress;
pub mod results;

pub use controller::{ScanController, ScanEvent, ScanHandle, ScanReport, ScanRun, ScanSource};
pub use enumerate::{filter_existing, walk, Enumerated};
pub use progress::{ConsoleProgressReporter, ProgressTracker, ScanProgress};
pub use results::{ResultTable, ScanStatistics};
