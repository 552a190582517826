//! Single quota-gated reputation lookup.

use crate::core::error::Error;
use crate::reputation::item::{DetectionCounts, LookupStatus};
use crate::reputation::providers::{ReputationService, ServiceResponse};
use crate::reputation::quota::QuotaStore;
use crate::utils::format::truncate_chars;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error as ThisError;

/// Characters of an unexpected response body kept in the error.
const ERROR_BODY_LEN: usize = 100;

/// Successful lookup result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The service knows the file
    Found {
        counts: DetectionCounts,
        last_analysis: Option<DateTime<Utc>>,
        /// The report's `attributes` object as returned
        attributes: serde_json::Value,
    },
    /// The service has never seen the file
    NotFound,
}

impl Verdict {
    pub fn status(&self) -> LookupStatus {
        match self {
            Verdict::Found { counts, .. } => counts.classify(),
            Verdict::NotFound => LookupStatus::NotFound,
        }
    }
}

/// Per-item lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum LookupError {
    #[error("{0}")]
    QuotaExceeded(String),

    #[error("Rate limit exceeded - please wait before making more requests")]
    RateLimited,

    #[error("Invalid API key - please check your API key")]
    AuthError,

    #[error("API error: {status} - {body}")]
    ApiError { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Quota check failed: {0}")]
    QuotaUnavailable(String),
}

impl LookupError {
    /// Whether later lookups in the same batch will fail the same way.
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, LookupError::QuotaExceeded(_))
    }
}

/// Result of one lookup.
pub type LookupOutcome = std::result::Result<Verdict, LookupError>;

#[derive(Debug, Deserialize)]
struct FileReport {
    data: ReportData,
}

#[derive(Debug, Deserialize)]
struct ReportData {
    attributes: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ReportAttributes {
    #[serde(default)]
    last_analysis_stats: AnalysisStats,
    #[serde(default)]
    last_analysis_date: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnalysisStats {
    malicious: u64,
    suspicious: u64,
    harmless: u64,
    undetected: u64,
}

/// Strip surrounding whitespace and inner spaces from a pasted digest.
pub fn normalize_digest(digest: &str) -> String {
    digest.trim().replace(' ', "")
}

/// Map a service response onto the outcome taxonomy.
pub fn classify_response(response: &ServiceResponse) -> LookupOutcome {
    match response.status {
        200 => {
            let report: FileReport = serde_json::from_str(&response.body)
                .map_err(|e| LookupError::MalformedResponse(e.to_string()))?;
            let attributes = report.data.attributes;
            let parsed: ReportAttributes = serde_json::from_value(attributes.clone())
                .map_err(|e| LookupError::MalformedResponse(e.to_string()))?;
            let stats = parsed.last_analysis_stats;
            let last_analysis = parsed
                .last_analysis_date
                .filter(|secs| *secs > 0)
                .and_then(|secs| DateTime::from_timestamp(secs, 0));
            Ok(Verdict::Found {
                counts: DetectionCounts {
                    malicious: stats.malicious,
                    suspicious: stats.suspicious,
                    harmless: stats.harmless,
                    undetected: stats.undetected,
                },
                last_analysis,
                attributes,
            })
        }
        404 => Ok(Verdict::NotFound),
        429 => Err(LookupError::RateLimited),
        401 => Err(LookupError::AuthError),
        status => Err(LookupError::ApiError {
            status,
            body: truncate_chars(&response.body, ERROR_BODY_LEN),
        }),
    }
}

/// Quota-gated client for one lookup at a time.
pub struct LookupClient {
    service: Box<dyn ReputationService>,
    quota: Arc<QuotaStore>,
}

impl LookupClient {
    pub fn new(service: Box<dyn ReputationService>, quota: Arc<QuotaStore>) -> Self {
        Self { service, quota }
    }

    pub fn quota(&self) -> &QuotaStore {
        &self.quota
    }

    pub fn service_name(&self) -> &str {
        self.service.name()
    }

    /// Look up one digest.
    ///
    /// No request is made when the quota is exhausted. Every request that is
    /// attempted counts one unit of usage, whatever its outcome.
    pub async fn lookup(&self, digest: &str) -> LookupOutcome {
        let digest = normalize_digest(digest);

        if let Err(e) = self.quota.check(1) {
            log::warn!("Lookup of {} refused: {}", digest, e);
            let message = e.to_string();
            return Err(if matches!(e, Error::QuotaExceeded { .. }) {
                LookupError::QuotaExceeded(message)
            } else {
                LookupError::QuotaUnavailable(message)
            });
        }

        let response = self.service.fetch(&digest).await;

        if let Err(e) = self.quota.record_usage(1) {
            log::error!("Failed to record lookup usage: {}", e);
        }

        let outcome = match response {
            Ok(response) => classify_response(&response),
            Err(e) => Err(LookupError::NetworkError(e.to_string())),
        };

        match &outcome {
            Ok(verdict) => log::info!("{} -> {}", digest, verdict.status()),
            Err(e) => log::warn!("{} -> {}", digest, e),
        }
        outcome
    }
}
