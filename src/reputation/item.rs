//! Lookup queue entries and their display state.

use crate::core::error::{Error, Result};
use crate::core::types::{DigestKind, FileRecord};
use crate::reputation::client::{LookupError, LookupOutcome, Verdict};
use crate::utils::format::{digest_prefix, truncate_chars};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Characters of the digest shown in result rows.
pub const DIGEST_DISPLAY_LEN: usize = 16;

/// Characters of an error message shown in the "Last Scan" column.
const ERROR_DISPLAY_LEN: usize = 20;

/// Status of one queued lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupStatus {
    Queued,
    Checking,
    Clean,
    Suspicious,
    Malicious,
    NotFound,
    Error,
}

impl LookupStatus {
    /// Whether the lookup for this item has finished.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LookupStatus::Queued | LookupStatus::Checking)
    }

    /// Label shown in result rows and exports.
    pub fn label(&self) -> &'static str {
        match self {
            LookupStatus::Queued => "QUEUED",
            LookupStatus::Checking => "CHECKING",
            LookupStatus::Clean => "CLEAN",
            LookupStatus::Suspicious => "SUSPICIOUS",
            LookupStatus::Malicious => "THREAT",
            LookupStatus::NotFound => "NOT FOUND",
            LookupStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LookupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Engine verdict counts from a successful lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetectionCounts {
    pub malicious: u64,
    pub suspicious: u64,
    pub harmless: u64,
    pub undetected: u64,
}

impl DetectionCounts {
    /// Engines that found nothing: harmless plus undetected.
    pub fn clean(&self) -> u64 {
        self.harmless + self.undetected
    }

    /// Malicious beats suspicious beats clean.
    pub fn classify(&self) -> LookupStatus {
        if self.malicious > 0 {
            LookupStatus::Malicious
        } else if self.suspicious > 0 {
            LookupStatus::Suspicious
        } else {
            LookupStatus::Clean
        }
    }
}

/// One digest queued for a reputation lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupItem {
    pub digest: String,
    pub digest_kind: DigestKind,
    pub filename: String,
    pub status: LookupStatus,
    /// Present only after a successful lookup
    pub detections: Option<DetectionCounts>,
    /// Last analysis date reported by the service
    pub last_scan: Option<DateTime<Utc>>,
    /// Message for items that ended in error
    pub error: Option<String>,
    /// Raw report attributes from the service, kept for JSON export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<serde_json::Value>,
}

impl LookupItem {
    /// Queue a digest of a known kind.
    pub fn new(digest: impl Into<String>, digest_kind: DigestKind, filename: impl Into<String>) -> Self {
        Self {
            digest: digest.into(),
            digest_kind,
            filename: filename.into(),
            status: LookupStatus::Queued,
            detections: None,
            last_scan: None,
            error: None,
            report: None,
        }
    }

    /// Queue a bare digest, inferring its kind from the hex length.
    pub fn from_digest(digest: &str) -> Result<Self> {
        let digest = digest.trim().replace(' ', "");
        let kind = DigestKind::from_hex(&digest).ok_or_else(|| {
            Error::invalid_input(format!("'{}' is not an MD5, SHA1 or SHA256 hex digest", digest))
        })?;
        Ok(Self::new(digest.to_lowercase(), kind, ""))
    }

    /// Queue the preferred digest of a scanned file. Returns `None` when the
    /// file could not be hashed.
    pub fn from_record(record: &FileRecord) -> Option<Self> {
        let digests = record.digests.digests()?;
        let (kind, digest) = digests.preferred()?;
        Some(Self::new(digest, kind, record.file_name()))
    }

    /// Apply the outcome of a lookup.
    pub fn apply(&mut self, outcome: &LookupOutcome) {
        match outcome {
            Ok(Verdict::Found {
                counts,
                last_analysis,
                attributes,
            }) => {
                self.status = counts.classify();
                self.detections = Some(*counts);
                self.last_scan = *last_analysis;
                self.error = None;
                self.report = Some(attributes.clone());
            }
            Ok(Verdict::NotFound) => {
                self.status = LookupStatus::NotFound;
                self.detections = None;
                self.last_scan = None;
                self.error = None;
                self.report = None;
            }
            Err(e) => {
                self.status = LookupStatus::Error;
                self.detections = None;
                self.last_scan = None;
                self.error = Some(e.to_string());
                self.report = None;
            }
        }
    }

    /// Mark the item as failed without a lookup.
    pub fn fail(&mut self, error: &LookupError) {
        self.apply(&Err(error.clone()));
    }

    /// Digest prefix for display.
    pub fn digest_display(&self) -> String {
        digest_prefix(&self.digest, DIGEST_DISPLAY_LEN)
    }

    /// Text of the "Last Scan" column.
    pub fn last_scan_display(&self) -> String {
        match self.status {
            LookupStatus::Queued => "Waiting...".to_string(),
            LookupStatus::Checking => "Scanning...".to_string(),
            LookupStatus::NotFound => "Not scanned".to_string(),
            LookupStatus::Error => truncate_chars(
                self.error.as_deref().unwrap_or("Unknown error"),
                ERROR_DISPLAY_LEN,
            ),
            _ => self
                .last_scan
                .map(|date| date.format("%m/%d/%Y").to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
        }
    }

    /// Count columns as displayed: numbers on success, zeros when not
    /// found, "?" otherwise.
    pub fn count_columns(&self) -> [String; 3] {
        match (&self.detections, self.status) {
            (Some(c), _) => [
                c.malicious.to_string(),
                c.suspicious.to_string(),
                c.clean().to_string(),
            ],
            (None, LookupStatus::NotFound) => ["0".into(), "0".into(), "0".into()],
            _ => ["?".into(), "?".into(), "?".into()],
        }
    }
}
