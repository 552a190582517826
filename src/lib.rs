//! hashsentry: streaming file hashing with quota-gated reputation lookups
//!
//! This crate computes MD5, SHA1 and SHA256 digests for a folder tree or a
//! list of files in a single streaming pass, with pause, resume and stop
//! control over the running scan. Selected digests can then be checked
//! against a file reputation service, paced to its free-tier rate and
//! bounded by a persisted daily and monthly usage quota.

pub mod core;
pub mod reputation;
pub mod scanner;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use crate::core::config::Config;
pub use crate::core::error::{Error, Result};
pub use crate::core::types::*;
