//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// hashsentry: streaming file hashing with reputation lookups
#[derive(Parser, Debug)]
#[command(name = "hashsentry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Use this configuration file instead of the default
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine processing
    Json,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Hash a folder or a list of files
    Hash {
        /// A single folder, or one or more files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Export results to file (.csv or .json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Look up the hashed files after the scan
        #[arg(short, long)]
        lookup: bool,

        /// Export lookup results to file (.csv or .json)
        #[arg(long, requires = "lookup")]
        lookup_output: Option<PathBuf>,
    },

    /// Look up digests directly
    Lookup {
        /// MD5, SHA1 or SHA256 hex digests
        #[arg(required = true)]
        digests: Vec<String>,

        /// Export lookup results to file (.csv or .json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show lookup quota usage
    Quota,

    /// Manage the reputation API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show application information
    Info,
}

/// API key subcommands.
#[derive(Subcommand, Debug)]
pub enum KeyAction {
    /// Store an API key
    Set {
        /// The key to store
        key: String,
    },

    /// Show the active key (masked) and its source
    Show,

    /// Delete the stored key
    Clear,
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,

    /// Print configuration file location
    Path,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
