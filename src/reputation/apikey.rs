//! API key persistence.
//!
//! The key file holds the base64 encoding of the key. This keeps it out of
//! casual view; it is not encryption.

use crate::core::config::{Config, LookupConfig};
use crate::core::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};

/// Environment variable that overrides every other key source.
pub const API_KEY_ENV: &str = "HASHSENTRY_VT_API_KEY";
/// Key file name inside the data directory.
pub const API_KEY_FILE: &str = "vt_api_key.dat";

/// Trailing characters left visible by [`masked`].
const VISIBLE_SUFFIX: usize = 8;

/// Where a resolved key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Environment,
    Config,
    KeyFile,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Environment => write!(f, "environment ({})", API_KEY_ENV),
            KeySource::Config => write!(f, "configuration file"),
            KeySource::KeyFile => write!(f, "key file"),
        }
    }
}

/// Base64 key file store.
#[derive(Debug, Clone)]
pub struct ApiKeyStore {
    path: PathBuf,
}

impl ApiKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location in the data directory.
    pub fn default_location() -> Self {
        Self::new(Config::data_dir().join(API_KEY_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save a key, replacing any stored one.
    pub fn save(&self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::invalid_input("API key must not be empty"));
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::DirectoryAccess {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(&self.path, STANDARD.encode(key.as_bytes()))
            .map_err(|e| Error::file_write(&self.path, e))?;
        log::info!("API key saved to {:?}", self.path);
        Ok(())
    }

    /// Load the stored key, if any.
    pub fn load(&self) -> Result<Option<String>> {
        let encoded = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::file_read(&self.path, e)),
        };

        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| Error::storage("key file", format!("invalid encoding: {}", e)))?;
        let key = String::from_utf8(bytes)
            .map_err(|e| Error::storage("key file", format!("invalid UTF-8: {}", e)))?;

        Ok(Some(key).filter(|k| !k.is_empty()))
    }

    /// Delete the stored key. Returns whether a key was removed.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::file_write(&self.path, e)),
        }
    }

    /// Find the key to use: environment, then configuration, then key file.
    pub fn resolve(&self, config: &LookupConfig) -> Option<(String, KeySource)> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Some((key.trim().to_string(), KeySource::Environment));
            }
        }

        if let Some(key) = config.api_key.as_deref().map(str::trim) {
            if !key.is_empty() {
                return Some((key.to_string(), KeySource::Config));
            }
        }

        match self.load() {
            Ok(Some(key)) => Some((key, KeySource::KeyFile)),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Ignoring unreadable API key file: {}", e);
                None
            }
        }
    }
}

/// Mask all but the last few characters of a key.
pub fn masked(key: &str) -> String {
    let len = key.chars().count();
    if len <= VISIBLE_SUFFIX {
        return "*".repeat(len);
    }
    let visible: String = key.chars().skip(len - VISIBLE_SUFFIX).collect();
    format!("{}{}", "*".repeat(len - VISIBLE_SUFFIX), visible)
}
