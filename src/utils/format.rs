//! Display formatting helpers.

use std::time::Duration;

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Render a byte count with a 1024-based unit suffix and one decimal place.
pub fn human_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in UNITS {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

/// Truncate to at most `max` characters without splitting a UTF-8 sequence.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Shorten a digest for table display.
pub fn digest_prefix(digest: &str, len: usize) -> String {
    if digest.chars().count() > len {
        format!("{}...", truncate_chars(digest, len))
    } else {
        digest.to_string()
    }
}

/// Render a duration as `1h 02m`, `3m 05s` or `12s`.
pub fn short_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{}s", s),
        (0, m, s) => format!("{}m {:02}s", m, s),
        (h, m, _) => format!("{}h {:02}m", h, m),
    }
}
