//! Scan progress tracking and reporting.

use crate::core::types::{FileRecord, ScanState};
use crate::utils::format::short_duration;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Progress information emitted after each processed file.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProgress {
    /// Path of the file just processed, relative to the scan root
    pub relative_path: String,
    /// One-based index of that file
    pub current_index: u64,
    /// Number of files in the run
    pub total_count: u64,
    /// `current_index / total_count * 100`
    pub percentage: f64,
    /// Estimated time left, once a rate is known
    pub remaining: Option<Duration>,
}

impl ScanProgress {
    /// Build a progress snapshot, clamping the percentage to 100.
    pub fn new(relative_path: impl Into<String>, current_index: u64, total_count: u64) -> Self {
        let percentage = if total_count > 0 {
            (current_index as f64 / total_count as f64 * 100.0).min(100.0)
        } else {
            100.0
        };
        Self {
            relative_path: relative_path.into(),
            current_index,
            total_count,
            percentage,
            remaining: None,
        }
    }

    /// Attach a time-left estimate.
    pub fn with_remaining(mut self, remaining: Option<Duration>) -> Self {
        self.remaining = remaining;
        self
    }

    /// Whether every file has been processed.
    pub fn is_complete(&self) -> bool {
        self.current_index >= self.total_count
    }
}

/// Per-run progress counter.
///
/// The total is fixed at construction so every percentage is computed
/// against the same denominator.
pub struct ProgressTracker {
    total: u64,
    processed: AtomicU64,
    errors: AtomicU64,
    start_time: Instant,
}

impl ProgressTracker {
    /// Create a tracker for a run of `total` files.
    pub fn new(total: u64) -> Self {
        Self {
            total,
            processed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Count one finished file and return the progress snapshot for it.
    pub fn advance(&self, relative_path: &str, failed: bool) -> ScanProgress {
        if failed {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        let index = self.processed.fetch_add(1, Ordering::SeqCst) + 1;
        ScanProgress::new(relative_path, index.min(self.total), self.total)
            .with_remaining(self.estimated_remaining())
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Calculate scan rate (files per second).
    pub fn files_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.processed() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Estimate remaining time based on progress.
    pub fn estimated_remaining(&self) -> Option<Duration> {
        let processed = self.processed();
        if processed == 0 || processed >= self.total {
            return None;
        }
        let rate = self.files_per_second();
        if rate > 0.0 {
            Some(Duration::from_secs_f64((self.total - processed) as f64 / rate))
        } else {
            None
        }
    }
}

/// Console progress reporter.
pub struct ConsoleProgressReporter {
    last_line_length: AtomicUsize,
    verbose: bool,
}

impl Default for ConsoleProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleProgressReporter {
    /// Create a new console reporter.
    pub fn new() -> Self {
        Self {
            last_line_length: AtomicUsize::new(0),
            verbose: false,
        }
    }

    /// Enable verbose output.
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Report progress to console.
    pub fn report(&self, progress: &ScanProgress) {
        self.write_line(&Self::progress_line(progress));
    }

    fn progress_line(progress: &ScanProgress) -> String {
        let eta = progress
            .remaining
            .map(|left| format!(" | ETA {}", short_duration(left)))
            .unwrap_or_default();
        format!(
            "\r[Hashing] {:.1}% | {}/{}{} | {}",
            progress.percentage,
            progress.current_index,
            progress.total_count,
            eta,
            progress.relative_path
        )
    }

    /// Report the paused status.
    pub fn report_paused(&self) {
        self.write_line("\r[Paused] waiting for resume...");
    }

    /// Report a hashed file.
    pub fn report_record(&self, record: &FileRecord) {
        if self.verbose && record.digests.is_error() {
            eprintln!(
                "\n  [!] {}: {}",
                record.relative_path,
                record.digests.column(crate::core::types::DigestKind::Sha256)
            );
        }
    }

    /// Print the final line for a run.
    pub fn finish(&self, state: ScanState, processed: u64, total: u64) {
        let status = match state {
            ScanState::Completed => "Complete",
            ScanState::Stopped => "Stopped",
            _ => "Finished",
        };
        self.write_line(&format!("\r[{}] {}/{} files", status, processed, total));
        eprintln!();
    }

    fn write_line(&self, message: &str) {
        let last_len = self.last_line_length.load(Ordering::Relaxed);
        let padding = if message.len() < last_len {
            " ".repeat(last_len - message.len())
        } else {
            String::new()
        };

        eprint!("{}{}", message, padding);
        self.last_line_length.store(message.len(), Ordering::Relaxed);
    }
}
