//! Scan orchestration: enumeration, hashing worker and run control.
//!
//! Each call to [`ScanController::start`] creates a fresh [`ScanRun`] that
//! owns the run state. The worker thread and the controller share only that
//! context; pause and stop are observed between files, never mid-digest.
//! File discovery runs on the worker too, so the controls stay usable while
//! a large tree is still being walked.

use crate::core::config::ScanConfig;
use crate::core::error::{Error, Result};
use crate::core::types::{DigestOutcome, FileRecord, ScanState, SourceKind};
use crate::scanner::enumerate::{self, absolutize, Enumerated};
use crate::scanner::progress::{ProgressTracker, ScanProgress};
use crate::utils::hash::HashCalculator;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// What to scan. A directory tree and an explicit list are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanSource {
    /// Walk a directory recursively
    Directory(PathBuf),
    /// Hash exactly these files
    Files(Vec<PathBuf>),
}

impl ScanSource {
    /// Pick the mode from command-line style input: one directory walks it,
    /// anything else is treated as a file list.
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        if paths.len() == 1 && paths[0].is_dir() {
            let mut paths = paths;
            ScanSource::Directory(paths.remove(0))
        } else {
            ScanSource::Files(paths)
        }
    }

    fn kind(&self) -> SourceKind {
        match self {
            ScanSource::Directory(_) => SourceKind::Folder,
            ScanSource::Files(_) => SourceKind::Files,
        }
    }
}

/// Events sent from the scan worker to the shell.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Enumeration finished; `total` is fixed for the run
    Started { total: u64 },
    /// A file finished hashing
    Progress(ScanProgress),
    /// The record for the file just processed
    FileHashed(FileRecord),
    /// The worker is waiting at a file boundary (sent every poll)
    Paused,
    /// The worker left the pause loop
    Resumed,
    /// A path was skipped during enumeration
    Warning { path: PathBuf, message: String },
    /// The run ended
    Finished {
        state: ScanState,
        processed: u64,
        total: u64,
    },
}

/// Final outcome of a run.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub id: Uuid,
    pub state: ScanState,
    pub total_files: u64,
    pub records: Vec<FileRecord>,
}

impl ScanReport {
    /// Number of records whose digests could not be computed.
    pub fn error_count(&self) -> usize {
        self.records.iter().filter(|r| r.digests.is_error()).count()
    }
}

/// Per-run control context.
#[derive(Debug)]
pub struct ScanRun {
    id: Uuid,
    state: AtomicU8,
    total_files: AtomicU64,
    pause_poll: Duration,
}

impl ScanRun {
    fn new(total_files: u64, pause_poll: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: AtomicU8::new(ScanState::Running.as_u8()),
            total_files: AtomicU64::new(total_files),
            pause_poll,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of files in the run. Zero until enumeration has finished.
    pub fn total_files(&self) -> u64 {
        self.total_files.load(Ordering::SeqCst)
    }

    fn set_total(&self, total: u64) {
        self.total_files.store(total, Ordering::SeqCst);
    }

    pub fn state(&self) -> ScanState {
        ScanState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn is_stopped(&self) -> bool {
        self.state() == ScanState::Stopped
    }

    /// Move to `to` if the current state is one of `from`.
    fn transition(&self, from: &[ScanState], to: ScanState, action: &str) -> Result<()> {
        self.state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                from.contains(&ScanState::from_u8(current))
                    .then_some(to.as_u8())
            })
            .map(|_| ())
            .map_err(|current| Error::invalid_transition(ScanState::from_u8(current), action))
    }

    /// File boundary check. Blocks while paused; returns false once stopped.
    fn checkpoint(&self, events: &mpsc::UnboundedSender<ScanEvent>) -> bool {
        let mut was_paused = false;
        loop {
            match self.state() {
                ScanState::Running => {
                    if was_paused {
                        log::info!("Scan {} resumed", self.id);
                        let _ = events.send(ScanEvent::Resumed);
                    }
                    return true;
                }
                ScanState::Paused => {
                    if !was_paused {
                        log::info!("Scan {} paused", self.id);
                    }
                    was_paused = true;
                    let _ = events.send(ScanEvent::Paused);
                    std::thread::sleep(self.pause_poll);
                }
                _ => return false,
            }
        }
    }

    /// Settle the terminal state once the worker leaves its loop.
    ///
    /// A run that processed every file is Completed even if a stop arrived
    /// after the last one.
    fn finish(&self, processed: u64) -> ScanState {
        let total = self.total_files();
        if total > 0 && processed >= total {
            self.state
                .store(ScanState::Completed.as_u8(), Ordering::SeqCst);
        }
        self.state()
    }
}

/// A file selected for hashing.
struct Candidate {
    path: PathBuf,
    relative_path: String,
}

impl Candidate {
    fn listed(path: PathBuf) -> Self {
        let relative_path = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            path,
            relative_path,
        }
    }
}

/// Handle to a started run.
pub struct ScanHandle {
    run: Arc<ScanRun>,
    events: mpsc::UnboundedReceiver<ScanEvent>,
    worker: JoinHandle<ScanReport>,
}

impl ScanHandle {
    pub fn id(&self) -> Uuid {
        self.run.id()
    }

    pub fn total_files(&self) -> u64 {
        self.run.total_files()
    }

    pub fn state(&self) -> ScanState {
        self.run.state()
    }

    /// Wait for the next worker event. Returns `None` after the worker exits
    /// and all events have been drained.
    pub async fn next_event(&mut self) -> Option<ScanEvent> {
        self.events.recv().await
    }

    /// Take an already queued event without waiting.
    pub fn try_next_event(&mut self) -> Option<ScanEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the worker and return its report.
    pub async fn join(self) -> Result<ScanReport> {
        self.worker
            .await
            .map_err(|e| Error::ScanWorker(e.to_string()))
    }
}

/// Orchestrates one scan run at a time.
pub struct ScanController {
    hasher: HashCalculator,
    pause_poll: Duration,
    current: Mutex<Option<Arc<ScanRun>>>,
}

impl Default for ScanController {
    fn default() -> Self {
        Self::new(&ScanConfig::default())
    }
}

impl ScanController {
    /// Create a controller using the scan section of the configuration.
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            hasher: HashCalculator::new().with_chunk_size(config.chunk_size),
            pause_poll: config.pause_poll(),
            current: Mutex::new(None),
        }
    }

    /// State of the most recent run, or `Idle` before the first one.
    pub fn state(&self) -> ScanState {
        self.current
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|run| run.state()))
            .unwrap_or(ScanState::Idle)
    }

    /// Start hashing `source` on a blocking worker.
    ///
    /// The run is registered before enumeration begins, so pause and stop
    /// apply from the first call. Resolves once the file count is known.
    /// Must be called from within a tokio runtime.
    pub async fn start(&self, source: ScanSource) -> Result<ScanHandle> {
        if let ScanSource::Directory(root) = &source {
            if !root.is_dir() {
                return Err(Error::invalid_input(format!(
                    "{} is not a directory",
                    root.display()
                )));
            }
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Internal(format!("No async runtime for scan worker: {}", e)))?;

        let run = Arc::new(ScanRun::new(0, self.pause_poll));
        let previous = self.reserve(&run)?;

        let (ready_tx, ready_rx) = oneshot::channel();
        let (tx, rx) = mpsc::unbounded_channel();
        let worker_run = Arc::clone(&run);
        let hasher = self.hasher;
        let worker = runtime.spawn_blocking(move || {
            run_worker(worker_run, hasher, source, ready_tx, tx)
        });

        let ready = ready_rx
            .await
            .unwrap_or_else(|_| Err(Error::ScanWorker("worker exited during enumeration".into())));

        match ready {
            Ok(_) => Ok(ScanHandle {
                run,
                events: rx,
                worker,
            }),
            Err(e) => {
                self.release(&run, previous);
                Err(e)
            }
        }
    }

    /// Running -> Paused.
    pub fn pause(&self) -> Result<()> {
        self.with_run("pause", |run| {
            run.transition(&[ScanState::Running], ScanState::Paused, "pause")
        })
    }

    /// Paused -> Running.
    pub fn resume(&self) -> Result<()> {
        self.with_run("resume", |run| {
            run.transition(&[ScanState::Paused], ScanState::Running, "resume")
        })
    }

    /// Pause a running scan or resume a paused one, returning the new state.
    pub fn toggle_pause(&self) -> Result<ScanState> {
        self.with_run("toggle pause", |run| match run.state() {
            ScanState::Running => run
                .transition(&[ScanState::Running], ScanState::Paused, "pause")
                .map(|_| ScanState::Paused),
            ScanState::Paused => run
                .transition(&[ScanState::Paused], ScanState::Running, "resume")
                .map(|_| ScanState::Running),
            other => Err(Error::invalid_transition(other, "toggle pause")),
        })
    }

    /// Running | Paused -> Stopped. Records already produced are kept.
    pub fn stop(&self) -> Result<()> {
        self.with_run("stop", |run| {
            run.transition(
                &[ScanState::Running, ScanState::Paused],
                ScanState::Stopped,
                "stop",
            )?;
            log::info!("Scan {} stop requested", run.id());
            Ok(())
        })
    }

    fn with_run<T, F>(&self, action: &str, f: F) -> Result<T>
    where
        F: FnOnce(&ScanRun) -> Result<T>,
    {
        let current = self
            .current
            .lock()
            .map_err(|_| Error::lock_poisoned("scan controller"))?;
        match current.as_ref() {
            Some(run) => f(run),
            None => Err(Error::invalid_transition(ScanState::Idle, action)),
        }
    }

    /// Make `run` the current run unless another one is still active.
    /// Returns the run it replaced.
    fn reserve(&self, run: &Arc<ScanRun>) -> Result<Option<Arc<ScanRun>>> {
        let mut current = self
            .current
            .lock()
            .map_err(|_| Error::lock_poisoned("scan controller"))?;
        if let Some(active) = current.as_ref() {
            if !active.state().is_terminal() {
                return Err(Error::ScanAlreadyRunning);
            }
        }
        Ok(current.replace(Arc::clone(run)))
    }

    /// Undo a reservation whose run never started hashing.
    fn release(&self, run: &Arc<ScanRun>, previous: Option<Arc<ScanRun>>) {
        if let Ok(mut current) = self.current.lock() {
            if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, run)) {
                *current = previous;
            }
        }
    }
}

fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Collect the files for a run, forwarding walk warnings as they occur.
/// Gives up early once the run is stopped.
fn discover(
    run: &ScanRun,
    source: &ScanSource,
    events: &mpsc::UnboundedSender<ScanEvent>,
) -> Vec<Candidate> {
    match source {
        ScanSource::Directory(root) => {
            let root = absolutize(root);
            let mut candidates = Vec::new();
            for item in enumerate::walk(&root) {
                if run.is_stopped() {
                    log::info!("Scan {} stopped during enumeration", run.id());
                    break;
                }
                match item {
                    Enumerated::File(path) => candidates.push(Candidate {
                        relative_path: relative_to(&path, &root),
                        path,
                    }),
                    Enumerated::Warning { path, message } => {
                        let _ = events.send(ScanEvent::Warning { path, message });
                    }
                }
            }
            candidates
        }
        ScanSource::Files(list) => enumerate::filter_existing(list.iter().map(|p| absolutize(p)))
            .into_iter()
            .map(Candidate::listed)
            .collect(),
    }
}

fn run_worker(
    run: Arc<ScanRun>,
    hasher: HashCalculator,
    source: ScanSource,
    ready: oneshot::Sender<Result<u64>>,
    events: mpsc::UnboundedSender<ScanEvent>,
) -> ScanReport {
    let kind = source.kind();
    let candidates = discover(&run, &source, &events);
    let total = candidates.len() as u64;

    if total == 0 && !run.is_stopped() {
        let _ = ready.send(Err(Error::invalid_input("No files to scan")));
        return ScanReport {
            id: run.id(),
            state: run.state(),
            total_files: 0,
            records: Vec::new(),
        };
    }

    run.set_total(total);
    let _ = ready.send(Ok(total));
    log::info!("Starting scan {} over {} file(s) ({})", run.id(), total, kind);
    let _ = events.send(ScanEvent::Started { total });

    let tracker = ProgressTracker::new(total);
    let mut records = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        if !run.checkpoint(&events) {
            break;
        }

        let size = std::fs::metadata(&candidate.path).ok().map(|m| m.len());
        let digests = hasher.digest_outcome(&candidate.path);
        if let DigestOutcome::Failed { message } = &digests {
            log::warn!("Failed to hash {:?}: {}", candidate.path, message);
        }

        let record = FileRecord::new(candidate.path, candidate.relative_path, size, digests, kind);
        let progress = tracker.advance(&record.relative_path, record.digests.is_error());

        let _ = events.send(ScanEvent::FileHashed(record.clone()));
        let _ = events.send(ScanEvent::Progress(progress));
        records.push(record);
    }

    let processed = tracker.processed();
    let state = run.finish(processed);
    log::info!(
        "Scan {} {}: {}/{} file(s), {} error(s), {:.1}s ({:.1} files/s)",
        run.id(),
        state,
        processed,
        total,
        tracker.errors(),
        tracker.elapsed().as_secs_f64(),
        tracker.files_per_second()
    );
    let _ = events.send(ScanEvent::Finished {
        state,
        processed,
        total,
    });

    ScanReport {
        id: run.id(),
        state,
        total_files: total,
        records,
    }
}
