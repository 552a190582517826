//! Utility functions and helpers.

pub mod format;
pub mod hash;
pub mod logging;

pub use format::human_size;
pub use hash::HashCalculator;
pub use logging::{init_logging, LogConfig};
