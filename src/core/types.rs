//! Core type definitions used throughout hashsentry.

use crate::utils::format::human_size;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Sentinel used when a file has no extension.
pub const NO_EXTENSION: &str = "No Extension";

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DigestKind {
    Md5,
    Sha1,
    Sha256,
}

impl DigestKind {
    /// Preferred order for reputation lookups, best first.
    pub const PREFERENCE: [DigestKind; 3] = [DigestKind::Sha256, DigestKind::Sha1, DigestKind::Md5];

    /// Length of the hex encoding of this digest.
    pub fn hex_len(&self) -> usize {
        match self {
            DigestKind::Md5 => 32,
            DigestKind::Sha1 => 40,
            DigestKind::Sha256 => 64,
        }
    }

    /// Infer the digest kind from a hex string.
    pub fn from_hex(digest: &str) -> Option<Self> {
        let digest = digest.trim();
        if !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match digest.len() {
            32 => Some(DigestKind::Md5),
            40 => Some(DigestKind::Sha1),
            64 => Some(DigestKind::Sha256),
            _ => None,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestKind::Md5 => "MD5",
            DigestKind::Sha1 => "SHA1",
            DigestKind::Sha256 => "SHA256",
        }
    }
}

impl std::fmt::Display for DigestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three digests produced by one streaming pass over a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DigestSet {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
}

impl DigestSet {
    /// Get the digest of the given kind.
    pub fn get(&self, kind: DigestKind) -> &str {
        match kind {
            DigestKind::Md5 => &self.md5,
            DigestKind::Sha1 => &self.sha1,
            DigestKind::Sha256 => &self.sha256,
        }
    }

    /// Pick the digest to use for a reputation lookup (SHA256, then SHA1, then MD5).
    pub fn preferred(&self) -> Option<(DigestKind, &str)> {
        DigestKind::PREFERENCE
            .iter()
            .map(|kind| (*kind, self.get(*kind)))
            .find(|(_, digest)| !digest.is_empty())
    }
}

/// Result of hashing one file. A read failure invalidates all three digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum DigestOutcome {
    Computed(DigestSet),
    Failed { message: String },
}

impl DigestOutcome {
    /// Get the digests if they were computed.
    pub fn digests(&self) -> Option<&DigestSet> {
        match self {
            DigestOutcome::Computed(set) => Some(set),
            DigestOutcome::Failed { .. } => None,
        }
    }

    /// Whether hashing failed.
    pub fn is_error(&self) -> bool {
        matches!(self, DigestOutcome::Failed { .. })
    }

    /// Text shown in a digest column.
    pub fn column(&self, kind: DigestKind) -> String {
        match self {
            DigestOutcome::Computed(set) => set.get(kind).to_string(),
            DigestOutcome::Failed { message } => format!("Error: {}", message),
        }
    }
}

/// How a file entered the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Discovered by walking a directory tree
    Folder,
    /// Supplied in an explicit file list
    Files,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Folder => write!(f, "Folder"),
            SourceKind::Files => write!(f, "Files"),
        }
    }
}

/// One processed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path, unique within a scan run
    pub path: PathBuf,
    /// Path relative to the scan root (file name for explicit lists)
    pub relative_path: String,
    /// File size in bytes, if it could be read
    pub size_bytes: Option<u64>,
    /// Lower-cased extension with leading dot, or [`NO_EXTENSION`]
    pub extension: String,
    /// Computed digests or the read error
    pub digests: DigestOutcome,
    /// Where the file came from
    pub source: SourceKind,
    /// Whether the user selected this record for lookup
    #[serde(default)]
    pub selected: bool,
}

impl FileRecord {
    /// Build a record for a file that has just been hashed.
    pub fn new(
        path: PathBuf,
        relative_path: String,
        size_bytes: Option<u64>,
        digests: DigestOutcome,
        source: SourceKind,
    ) -> Self {
        let extension = extension_of(&path);
        Self {
            path,
            relative_path,
            size_bytes,
            extension,
            digests,
            source,
            selected: false,
        }
    }

    /// Human readable size, or "Unknown".
    pub fn size_human(&self) -> String {
        match self.size_bytes {
            Some(size) => human_size(size),
            None => "Unknown".to_string(),
        }
    }

    /// File name component of the path.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.relative_path.clone())
    }

    /// Flip the selection flag, returning the new value.
    pub fn toggle_selected(&mut self) -> bool {
        self.selected = !self.selected;
        self.selected
    }
}

/// Lower-cased extension including the leading dot.
pub fn extension_of(path: &Path) -> String {
    match path.extension() {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.to_string_lossy().to_lowercase()),
        _ => NO_EXTENSION.to_string(),
    }
}

/// Lifecycle state of a scan run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    Idle,
    Running,
    Paused,
    Stopped,
    Completed,
}

impl ScanState {
    /// Whether the run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanState::Stopped | ScanState::Completed)
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            ScanState::Idle => 0,
            ScanState::Running => 1,
            ScanState::Paused => 2,
            ScanState::Stopped => 3,
            ScanState::Completed => 4,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ScanState::Running,
            2 => ScanState::Paused,
            3 => ScanState::Stopped,
            4 => ScanState::Completed,
            _ => ScanState::Idle,
        }
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanState::Idle => write!(f, "idle"),
            ScanState::Running => write!(f, "running"),
            ScanState::Paused => write!(f, "paused"),
            ScanState::Stopped => write!(f, "stopped"),
            ScanState::Completed => write!(f, "completed"),
        }
    }
}
