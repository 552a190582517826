//! Persisted usage counters and their integrity rules.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DAY_FORMAT: &str = "%Y-%m-%d";
const MONTH_FORMAT: &str = "%Y-%m";

/// Daily usage entries are kept for this many days.
pub const DAILY_RETENTION_DAYS: i64 = 30;
/// Monthly usage entries are kept while their first day is this recent.
pub const MONTHLY_RETENTION_DAYS: i64 = 365;
/// Allowed gap between a month's counter and the sum of its days.
pub const MONTH_SUM_TOLERANCE: i64 = 10;

/// Usage ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
    pub daily: u64,
    pub monthly: u64,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            daily: 500,
            monthly: 15_000,
        }
    }
}

impl From<&crate::core::config::QuotaConfig> for QuotaLimits {
    fn from(config: &crate::core::config::QuotaConfig) -> Self {
        Self {
            daily: config.daily_limit,
            monthly: config.monthly_limit,
        }
    }
}

/// Usage counters as stored on disk or in the registry.
///
/// Counts are signed so that tampered negative values survive parsing and
/// fail validation instead of being rejected as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    /// `YYYY-MM-DD` -> requests made that day
    pub daily: BTreeMap<String, i64>,
    /// `YYYY-MM` -> requests made that month
    pub monthly: BTreeMap<String, i64>,
    pub current_day: String,
    pub current_month: String,
}

/// Storage key for a day.
pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}

/// Storage key for the month containing `date`.
pub fn month_key(date: NaiveDate) -> String {
    date.format(MONTH_FORMAT).to_string()
}

fn parse_day(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(key, DAY_FORMAT).ok()
}

fn parse_month(key: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", key), DAY_FORMAT).ok()
}

impl QuotaRecord {
    /// An empty record for `today`.
    pub fn empty(today: NaiveDate) -> Self {
        Self {
            daily: BTreeMap::new(),
            monthly: BTreeMap::new(),
            current_day: day_key(today),
            current_month: month_key(today),
        }
    }

    /// The record written after a failed integrity check: zero usage today.
    pub fn reset(today: NaiveDate) -> Self {
        let mut record = Self::empty(today);
        record.daily.insert(day_key(today), 0);
        record.monthly.insert(month_key(today), 0);
        record
    }

    /// Requests made on `date`.
    pub fn daily_used(&self, date: NaiveDate) -> u64 {
        self.daily.get(&day_key(date)).copied().unwrap_or(0).max(0) as u64
    }

    /// Requests made in the month containing `date`.
    pub fn monthly_used(&self, date: NaiveDate) -> u64 {
        self.monthly.get(&month_key(date)).copied().unwrap_or(0).max(0) as u64
    }

    /// Check the record for signs of corruption or manipulation.
    ///
    /// Fails on unparseable date keys, negative counts, counts above twice
    /// their ceiling, or a current-month counter that differs from the sum
    /// of that month's days by more than [`MONTH_SUM_TOLERANCE`].
    pub fn is_valid(&self, limits: &QuotaLimits, today: NaiveDate) -> bool {
        let daily_cap = limits.daily.saturating_mul(2) as i64;
        let monthly_cap = limits.monthly.saturating_mul(2) as i64;

        for (key, count) in &self.daily {
            if parse_day(key).is_none() || *count < 0 || *count > daily_cap {
                return false;
            }
        }

        for (key, count) in &self.monthly {
            if parse_month(key).is_none() || *count < 0 || *count > monthly_cap {
                return false;
            }
        }

        let month = month_key(today);
        if let Some(month_count) = self.monthly.get(&month) {
            let day_sum: i64 = self
                .daily
                .iter()
                .filter(|(key, _)| key.starts_with(&month))
                .map(|(_, count)| *count)
                .sum();
            if (month_count - day_sum).abs() > MONTH_SUM_TOLERANCE {
                return false;
            }
        }

        true
    }

    /// Drop entries outside the retention windows.
    ///
    /// Days of the current month are always kept so the month-sum check
    /// stays meaningful on the 31st.
    pub fn prune(&mut self, today: NaiveDate) {
        let day_cutoff = today - Duration::days(DAILY_RETENTION_DAYS);
        let month_cutoff = today - Duration::days(MONTHLY_RETENTION_DAYS);
        let this_month = (today.year(), today.month());

        self.daily.retain(|key, _| match parse_day(key) {
            Some(date) => date > day_cutoff || (date.year(), date.month()) == this_month,
            None => false,
        });
        self.monthly.retain(|key, _| match parse_month(key) {
            Some(first) => first > month_cutoff,
            None => false,
        });
    }

    /// Add `count` requests to `today` and its month.
    pub fn add_usage(&mut self, count: u64, today: NaiveDate) {
        let count = count as i64;
        self.prune(today);
        *self.daily.entry(day_key(today)).or_insert(0) += count;
        *self.monthly.entry(month_key(today)).or_insert(0) += count;
        self.current_day = day_key(today);
        self.current_month = month_key(today);
    }
}
