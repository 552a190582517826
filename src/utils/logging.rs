//! Logging infrastructure for hashsentry.

use crate::core::config::Config;
use crate::core::error::{Error, Result};
use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Logging configuration.
pub struct LogConfig {
    /// Log level
    pub level: LevelFilter,
    /// Write to a log file instead of stderr
    pub file_path: Option<PathBuf>,
    /// Show timestamps
    pub timestamps: bool,
    /// Show module path
    pub module_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            file_path: None,
            timestamps: true,
            module_path: false,
        }
    }
}

impl LogConfig {
    /// Create a log config from application config.
    pub fn from_config(config: &Config) -> Self {
        let level = parse_level(&config.logging.log_level);

        Self {
            level,
            file_path: None,
            timestamps: true,
            module_path: level == LevelFilter::Debug || level == LevelFilter::Trace,
        }
    }

    /// Create a verbose log config for CLI.
    pub fn verbose() -> Self {
        Self {
            level: LevelFilter::Debug,
            file_path: None,
            timestamps: true,
            module_path: true,
        }
    }

    /// Create a quiet log config (errors only).
    pub fn quiet() -> Self {
        Self {
            level: LevelFilter::Error,
            file_path: None,
            timestamps: false,
            module_path: false,
        }
    }

    /// Send log output to a file.
    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }
}

/// Parse a textual log level, defaulting to info.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" | "warning" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Initialize the logging system.
pub fn init_logging(config: LogConfig) -> Result<()> {
    let mut builder = Builder::new();
    builder.filter_level(config.level);

    let colored = config.file_path.is_none();
    let timestamps = config.timestamps;
    let module_path = config.module_path;

    builder.format(move |buf, record| {
        let mut output = String::new();

        if timestamps {
            output.push_str(&format!("{} ", Local::now().format("%Y-%m-%d %H:%M:%S")));
        }

        let level_str = if colored {
            match record.level() {
                log::Level::Error => "\x1b[31mERROR\x1b[0m",
                log::Level::Warn => "\x1b[33mWARN\x1b[0m ",
                log::Level::Info => "\x1b[32mINFO\x1b[0m ",
                log::Level::Debug => "\x1b[34mDEBUG\x1b[0m",
                log::Level::Trace => "\x1b[35mTRACE\x1b[0m",
            }
        } else {
            match record.level() {
                log::Level::Error => "ERROR",
                log::Level::Warn => "WARN ",
                log::Level::Info => "INFO ",
                log::Level::Debug => "DEBUG",
                log::Level::Trace => "TRACE",
            }
        };
        output.push_str(&format!("[{}] ", level_str));

        if module_path {
            if let Some(path) = record.module_path() {
                output.push_str(&format!("{}: ", path));
            }
        }

        output.push_str(&format!("{}", record.args()));

        writeln!(buf, "{}", output)
    });

    if let Some(path) = &config.file_path {
        let file = open_log_file(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    // A second init (e.g. in tests) keeps the first logger.
    if builder.try_init().is_err() {
        log::trace!("Logger already initialized");
    }

    log::debug!("Logging initialized with level: {:?}", config.level);
    Ok(())
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::ConfigSave(format!("Failed to create log directory: {}", e)))?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::file_write(path, e))
}

/// Clean up old log files.
pub fn cleanup_old_logs(log_dir: &Path, keep_days: u32) -> Result<u32> {
    use std::time::{Duration, SystemTime};

    let cutoff = SystemTime::now() - Duration::from_secs(keep_days as u64 * 24 * 60 * 60);
    let mut deleted = 0u32;

    if !log_dir.exists() {
        return Ok(0);
    }

    let entries = fs::read_dir(log_dir).map_err(|e| Error::DirectoryAccess {
        path: log_dir.to_path_buf(),
        source: e,
    })?;

    for entry in entries.flatten() {
        let path = entry.path();

        if path.extension().is_some_and(|ext| ext == "log") {
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                if modified < cutoff && fs::remove_file(&path).is_ok() {
                    log::debug!("Deleted old log file: {:?}", path);
                    deleted += 1;
                }
            }
        }
    }

    if deleted > 0 {
        log::info!("Cleaned up {} old log file(s)", deleted);
    }

    Ok(deleted)
}
