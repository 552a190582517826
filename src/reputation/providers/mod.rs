//! Reputation service providers.
//!
//! Supports:
//! - VirusTotal v3 file lookups
//! - Mock provider for testing

mod virustotal;

pub use virustotal::VirusTotalProvider;

use crate::core::config::LookupConfig;
use crate::core::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error as ThisError;

/// Raw answer from the service: HTTP status and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: String,
}

impl ServiceResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// The request never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("cannot connect: {0}")]
    Connect(String),
    #[error("{0}")]
    Other(String),
}

/// An external file reputation service.
#[async_trait]
pub trait ReputationService: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Fetch the report for one digest.
    async fn fetch(&self, digest: &str) -> std::result::Result<ServiceResponse, TransportError>;
}

#[async_trait]
impl<T: ReputationService + ?Sized> ReputationService for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch(&self, digest: &str) -> std::result::Result<ServiceResponse, TransportError> {
        (**self).fetch(digest).await
    }
}

/// Create the configured provider.
pub fn create_provider(
    config: &LookupConfig,
    api_key: Option<String>,
) -> Result<Box<dyn ReputationService>> {
    let api_key = api_key
        .filter(|key| !key.trim().is_empty())
        .ok_or(Error::MissingApiKey)?;
    let provider = VirusTotalProvider::new(&config.endpoint, &api_key, config.timeout_secs)?;
    Ok(Box::new(provider))
}

/// Scripted reply for [`MockProvider`].
pub type MockReply = std::result::Result<ServiceResponse, TransportError>;

/// Build a VirusTotal-style file report body.
pub fn report_body(malicious: u64, suspicious: u64, harmless: u64, undetected: u64, date: i64) -> String {
    serde_json::json!({
        "data": {
            "attributes": {
                "last_analysis_stats": {
                    "malicious": malicious,
                    "suspicious": suspicious,
                    "harmless": harmless,
                    "undetected": undetected,
                },
                "last_analysis_date": date,
            }
        }
    })
    .to_string()
}

/// Mock provider for testing.
///
/// Digests without a scripted reply answer 404.
pub struct MockProvider {
    replies: Mutex<HashMap<String, MockReply>>,
    requested: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Create a new mock provider.
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            requested: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Script the reply for one digest.
    pub fn with_reply(self, digest: &str, reply: MockReply) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.insert(digest.to_string(), reply);
        }
        self
    }

    /// Script a 200 report for one digest.
    pub fn with_report(self, digest: &str, malicious: u64, suspicious: u64, clean: u64) -> Self {
        let body = report_body(malicious, suspicious, clean, 0, 1_700_000_000);
        self.with_reply(digest, Ok(ServiceResponse::new(200, body)))
    }

    /// Number of fetches made.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Digests requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReputationService for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(&self, digest: &str) -> std::result::Result<ServiceResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requested) = self.requested.lock() {
            requested.push(digest.to_string());
        }

        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|replies| replies.get(digest).cloned());
        reply.unwrap_or_else(|| Ok(ServiceResponse::new(404, r#"{"error": {"code": "NotFoundError"}}"#)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider_requires_key() {
        let config = LookupConfig::default();
        assert!(matches!(
            create_provider(&config, None),
            Err(Error::MissingApiKey)
        ));
        assert!(matches!(
            create_provider(&config, Some("   ".into())),
            Err(Error::MissingApiKey)
        ));
        let provider = create_provider(&config, Some("k".repeat(64))).unwrap();
        assert_eq!(provider.name(), "virustotal");
    }

    #[tokio::test]
    async fn test_mock_provider_replies() {
        let mock = MockProvider::new()
            .with_report("aa", 1, 0, 5)
            .with_reply("bb", Err(TransportError::Timeout));

        assert_eq!(mock.fetch("aa").await.unwrap().status, 200);
        assert_eq!(mock.fetch("bb").await, Err(TransportError::Timeout));
        assert_eq!(mock.fetch("cc").await.unwrap().status, 404);
        assert_eq!(mock.calls(), 3);
        assert_eq!(mock.requested(), vec!["aa", "bb", "cc"]);
    }
}
