//! Configuration management for hashsentry.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scan-related settings
    pub scan: ScanConfig,
    /// Reputation lookup settings
    pub lookup: LookupConfig,
    /// Usage ceilings and quota persistence
    pub quota: QuotaConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigSave(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| Error::ConfigSave(format!("Failed to write config file: {}", e)))
    }

    /// Load configuration from default location, or create default if not exists.
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            match Self::load(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    log::warn!("Failed to load config, using defaults: {}", e);
                }
            }
        }

        let config = Self::default();

        if let Err(e) = config.save(&config_path) {
            log::warn!("Failed to save default config: {}", e);
        }

        config
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        Self::data_dir().join("config.json")
    }

    /// Get the application data directory.
    pub fn data_dir() -> PathBuf {
        #[cfg(windows)]
        {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData"))
                .join("HashSentry")
        }

        #[cfg(not(windows))]
        {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("hashsentry")
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.scan.chunk_size == 0 {
            return Err(Error::ConfigInvalid {
                field: "scan.chunk_size".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.scan.pause_poll_ms == 0 {
            return Err(Error::ConfigInvalid {
                field: "scan.pause_poll_ms".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.lookup.timeout_secs == 0 {
            return Err(Error::ConfigInvalid {
                field: "lookup.timeout_secs".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if !self.lookup.endpoint.starts_with("http://") && !self.lookup.endpoint.starts_with("https://") {
            return Err(Error::ConfigInvalid {
                field: "lookup.endpoint".to_string(),
                message: "Must be an http(s) URL".to_string(),
            });
        }

        if self.quota.daily_limit == 0 || self.quota.monthly_limit == 0 {
            return Err(Error::ConfigInvalid {
                field: "quota".to_string(),
                message: "Daily and monthly limits must be greater than 0".to_string(),
            });
        }

        if self.quota.daily_limit > self.quota.monthly_limit {
            return Err(Error::ConfigInvalid {
                field: "quota.daily_limit".to_string(),
                message: "Must not exceed quota.monthly_limit".to_string(),
            });
        }

        if self.logging.keep_logs_days == 0 {
            return Err(Error::ConfigInvalid {
                field: "logging.keep_logs_days".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Scan-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Read chunk size in bytes
    pub chunk_size: usize,
    /// Poll interval while a scan is paused (milliseconds)
    pub pause_poll_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            chunk_size: crate::utils::hash::DEFAULT_CHUNK_SIZE,
            pause_poll_ms: 200,
        }
    }
}

impl ScanConfig {
    /// Pause poll interval as a duration.
    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }
}

/// Reputation lookup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Base URL of the file lookup endpoint
    pub endpoint: String,
    /// API key (falls back to the key file when unset)
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Minimum interval between consecutive lookups (seconds)
    pub pacing_secs: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.virustotal.com/api/v3/files".to_string(),
            api_key: None,
            timeout_secs: 30,
            pacing_secs: 16,
        }
    }
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_secs)
    }
}

/// Quota ceilings and persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Maximum lookups per calendar day
    pub daily_limit: u64,
    /// Maximum lookups per calendar month
    pub monthly_limit: u64,
    /// Try the OS secure store before the file
    pub use_secure_store: bool,
    /// Path of the fallback quota file
    pub file_path: Option<PathBuf>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: 500,
            monthly_limit: 15_000,
            use_secure_store: true,
            file_path: None,
        }
    }
}

impl QuotaConfig {
    /// Get the effective quota file path.
    pub fn quota_file(&self) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("quota_tracking.json"))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Days to keep log files
    pub keep_logs_days: u32,
    /// Path for log files
    pub log_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            keep_logs_days: 30,
            log_path: None,
        }
    }
}

impl LoggingConfig {
    /// Get the effective log directory.
    pub fn log_dir(&self) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("logs"))
    }
}
