//! Error types and result handling for hashsentry.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hashsentry operations.
#[derive(Error, Debug)]
pub enum Error {
    // ===== I/O Errors =====
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to access directory: {path}")]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // ===== Configuration Errors =====
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("Failed to save configuration: {0}")]
    ConfigSave(String),

    #[error("Invalid configuration value: {field} - {message}")]
    ConfigInvalid { field: String, message: String },

    // ===== Scanning Errors =====
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("A scan is already in progress")]
    ScanAlreadyRunning,

    #[error("Cannot {action} a scan that is {from}")]
    InvalidTransition { from: String, action: String },

    #[error("Scan worker failed: {0}")]
    ScanWorker(String),

    // ===== Lookup Errors =====
    #[error("Lookup queue is empty")]
    EmptyQueue,

    #[error("{period} quota exceeded: used {used}/{limit}")]
    QuotaExceeded {
        period: String,
        used: u64,
        limit: u64,
    },

    #[error("No reputation API key configured")]
    MissingApiKey,

    // ===== Storage Errors =====
    #[error("Quota storage error ({backend}): {message}")]
    Storage { backend: String, message: String },

    #[error("Quota record failed integrity validation")]
    IntegrityViolation,

    // ===== Network Errors =====
    #[error("Network error: {0}")]
    Network(String),

    // ===== Concurrency Errors =====
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    // ===== Serialization Errors =====
    #[error("JSON serialization error")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    // ===== Generic Errors =====
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create a file read error.
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Create a file write error.
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an invalid state transition error.
    pub fn invalid_transition(from: impl ToString, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            action: action.into(),
        }
    }

    /// Create a storage tier error.
    pub fn storage(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a lock poisoned error.
    pub fn lock_poisoned(context: impl Into<String>) -> Self {
        Self::LockPoisoned {
            context: context.into(),
        }
    }

    /// Check if this error is recoverable (the run can continue).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::FileRead { .. }
                | Error::DirectoryAccess { .. }
                | Error::QuotaExceeded { .. }
                | Error::Storage { .. }
                | Error::IntegrityViolation
                | Error::Network(_)
        )
    }

    /// Get a user-friendly suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::PathNotFound(_) => Some("Check that the path exists and is accessible"),
            Error::InvalidInput(_) => Some("Select a folder or files that contain at least one file"),
            Error::ConfigLoad(_) | Error::ConfigInvalid { .. } => {
                Some("Check your configuration file for syntax errors or missing fields")
            }
            Error::QuotaExceeded { .. } => {
                Some("Wait for the daily or monthly quota to reset, or check fewer files")
            }
            Error::MissingApiKey => Some("Set a key with: hashsentry key set <API_KEY>"),
            Error::Network(_) => Some("Check your network connection and try again"),
            Error::LockPoisoned { .. } => Some("Internal error: restart the application"),
            _ => None,
        }
    }

    /// Get the error category for logging.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::FileRead { .. }
            | Error::FileWrite { .. }
            | Error::DirectoryAccess { .. }
            | Error::PathNotFound(_)
            | Error::Io(_) => ErrorCategory::Io,

            Error::ConfigLoad(_) | Error::ConfigSave(_) | Error::ConfigInvalid { .. } => {
                ErrorCategory::Configuration
            }

            Error::InvalidInput(_)
            | Error::ScanAlreadyRunning
            | Error::InvalidTransition { .. }
            | Error::ScanWorker(_) => ErrorCategory::Scanning,

            Error::EmptyQueue | Error::QuotaExceeded { .. } | Error::MissingApiKey => {
                ErrorCategory::Lookup
            }

            Error::Storage { .. } | Error::IntegrityViolation => ErrorCategory::Storage,

            Error::Network(_) => ErrorCategory::Network,

            Error::LockPoisoned { .. } => ErrorCategory::Concurrency,

            Error::JsonSerialize(_) | Error::Csv(_) => ErrorCategory::Serialization,

            Error::NotSupported(_) | Error::Internal(_) | Error::Other(_) => ErrorCategory::Other,
        }
    }
}

/// Error category for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Io,
    Configuration,
    Scanning,
    Lookup,
    Storage,
    Network,
    Concurrency,
    Serialization,
    Other,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io => write!(f, "I/O"),
            Self::Configuration => write!(f, "Configuration"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Lookup => write!(f, "Lookup"),
            Self::Storage => write!(f, "Storage"),
            Self::Network => write!(f, "Network"),
            Self::Concurrency => write!(f, "Concurrency"),
            Self::Serialization => write!(f, "Serialization"),
            Self::Other => write!(f, "Other"),
        }
    }
}
