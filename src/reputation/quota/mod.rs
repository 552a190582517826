//! Daily and monthly usage quota for reputation lookups.
//!
//! The store is created once and shared by reference. The record is loaded
//! lazily from the first storage tier that answers, validated, and written
//! back after every change. A tier that fails is skipped; the in-memory tier
//! at the end of the chain always succeeds.

mod record;
mod storage;

pub use record::{
    day_key, month_key, QuotaLimits, QuotaRecord, DAILY_RETENTION_DAYS, MONTHLY_RETENTION_DAYS,
    MONTH_SUM_TOLERANCE,
};
pub use storage::{
    FileBackend, MemoryBackend, QuotaBackend, RegistryBackend, REGISTRY_KEY, REGISTRY_VALUE,
};

use crate::core::config::QuotaConfig;
use crate::core::error::{Error, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Snapshot of quota usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub daily_used: u64,
    pub daily_remaining: u64,
    pub monthly_used: u64,
    pub monthly_remaining: u64,
    pub daily_limit: u64,
    pub monthly_limit: u64,
}

impl QuotaStatus {
    fn new(record: &QuotaRecord, limits: &QuotaLimits, today: NaiveDate) -> Self {
        let daily_used = record.daily_used(today);
        let monthly_used = record.monthly_used(today);
        Self {
            daily_used,
            daily_remaining: limits.daily.saturating_sub(daily_used),
            monthly_used,
            monthly_remaining: limits.monthly.saturating_sub(monthly_used),
            daily_limit: limits.daily,
            monthly_limit: limits.monthly,
        }
    }

    /// Whether at least one more request fits in both windows.
    pub fn can_make_request(&self) -> bool {
        self.daily_remaining > 0 && self.monthly_remaining > 0
    }

    /// Fail if `count` more requests would exceed either ceiling.
    pub fn ensure_room(&self, count: u64) -> Result<()> {
        if count > self.daily_remaining {
            return Err(Error::QuotaExceeded {
                period: "Daily".to_string(),
                used: self.daily_used,
                limit: self.daily_limit,
            });
        }
        if count > self.monthly_remaining {
            return Err(Error::QuotaExceeded {
                period: "Monthly".to_string(),
                used: self.monthly_used,
                limit: self.monthly_limit,
            });
        }
        Ok(())
    }
}

struct QuotaState {
    backends: Vec<Box<dyn QuotaBackend>>,
    record: Option<QuotaRecord>,
}

impl QuotaState {
    fn load(&mut self) -> Option<String> {
        for backend in self.backends.iter_mut() {
            match backend.load() {
                Ok(Some(data)) => {
                    log::debug!("Loaded quota record from {}", backend.name());
                    return Some(data);
                }
                Ok(None) => continue,
                Err(e) => {
                    log::debug!("Quota tier {} unavailable: {}", backend.name(), e);
                }
            }
        }
        None
    }

    fn persist(&mut self, record: &QuotaRecord) {
        let data = match serde_json::to_string_pretty(record) {
            Ok(data) => data,
            Err(e) => {
                log::error!("Failed to serialize quota record: {}", e);
                return;
            }
        };

        for backend in self.backends.iter_mut() {
            match backend.save(&data) {
                Ok(()) => {
                    log::trace!("Saved quota record to {}", backend.name());
                    return;
                }
                Err(e) => {
                    log::debug!("Quota tier {} failed to save: {}", backend.name(), e);
                }
            }
        }
        log::warn!("All quota storage tiers failed; usage is tracked in memory only");
    }
}

/// Persisted, validated usage counters shared by every lookup.
pub struct QuotaStore {
    limits: QuotaLimits,
    state: Mutex<QuotaState>,
}

impl QuotaStore {
    /// Create a store over the given tiers. An in-memory tier is appended.
    pub fn new(limits: QuotaLimits, mut backends: Vec<Box<dyn QuotaBackend>>) -> Self {
        backends.push(Box::new(MemoryBackend::new()));
        Self {
            limits,
            state: Mutex::new(QuotaState {
                backends,
                record: None,
            }),
        }
    }

    /// Registry (when enabled) then the quota file.
    pub fn from_config(config: &QuotaConfig) -> Self {
        let mut backends: Vec<Box<dyn QuotaBackend>> = Vec::new();
        if config.use_secure_store {
            backends.push(Box::new(RegistryBackend::new()));
        }
        backends.push(Box::new(FileBackend::new(config.quota_file())));
        Self::new(QuotaLimits::from(config), backends)
    }

    /// A store that never touches disk.
    pub fn in_memory(limits: QuotaLimits) -> Self {
        Self::new(limits, Vec::new())
    }

    pub fn limits(&self) -> QuotaLimits {
        self.limits
    }

    /// Check a record against the integrity rules.
    pub fn validate_integrity(&self, record: &QuotaRecord, today: NaiveDate) -> bool {
        record.is_valid(&self.limits, today)
    }

    /// Current usage.
    pub fn status(&self) -> Result<QuotaStatus> {
        self.status_on(today())
    }

    pub fn status_on(&self, today: NaiveDate) -> Result<QuotaStatus> {
        self.with_record(today, |record, _| QuotaStatus::new(record, &self.limits, today))
    }

    /// Fail with [`Error::QuotaExceeded`] if `count` more requests do not fit.
    pub fn check(&self, count: u64) -> Result<()> {
        self.check_on(count, today())
    }

    pub fn check_on(&self, count: u64, today: NaiveDate) -> Result<()> {
        self.status_on(today)?.ensure_room(count)
    }

    /// Count `count` requests against today and this month, then persist.
    pub fn record_usage(&self, count: u64) -> Result<QuotaStatus> {
        self.record_usage_on(count, today())
    }

    pub fn record_usage_on(&self, count: u64, today: NaiveDate) -> Result<QuotaStatus> {
        self.with_record(today, |record, dirty| {
            record.add_usage(count, today);
            *dirty = true;
            QuotaStatus::new(record, &self.limits, today)
        })
    }

    /// Run `f` on the validated record, persisting it if it changed.
    fn with_record<T, F>(&self, today: NaiveDate, f: F) -> Result<T>
    where
        F: FnOnce(&mut QuotaRecord, &mut bool) -> T,
    {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::lock_poisoned("quota store"))?;

        let mut dirty = false;
        let mut record = match state.record.take() {
            Some(record) => record,
            None => match state.load() {
                Some(data) => match serde_json::from_str::<QuotaRecord>(&data) {
                    Ok(record) => record,
                    Err(e) => {
                        log::warn!("Quota record is unreadable ({}), resetting", e);
                        dirty = true;
                        QuotaRecord::reset(today)
                    }
                },
                None => QuotaRecord::empty(today),
            },
        };

        if !record.is_valid(&self.limits, today) {
            log::warn!("{}; resetting usage counters", Error::IntegrityViolation);
            record = QuotaRecord::reset(today);
            dirty = true;
        }

        let result = f(&mut record, &mut dirty);
        if dirty {
            state.persist(&record);
        }
        state.record = Some(record);
        Ok(result)
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
