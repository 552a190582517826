//! VirusTotal v3 file report provider.

use super::{ReputationService, ServiceResponse, TransportError};
use crate::core::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// VirusTotal API provider.
pub struct VirusTotalProvider {
    /// Base URL of the files endpoint
    endpoint: String,
    /// API key sent in the `x-apikey` header
    api_key: String,
    /// Request timeout
    timeout: Duration,
    /// HTTP client
    client: reqwest::Client,
}

impl VirusTotalProvider {
    /// Create a new provider.
    pub fn new(endpoint: &str, api_key: &str, timeout_secs: u64) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hashsentry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            timeout,
            client,
        })
    }

    /// URL of the report for one digest.
    fn file_url(&self, digest: &str) -> String {
        format!("{}/{}", self.endpoint, digest)
    }
}

#[async_trait]
impl ReputationService for VirusTotalProvider {
    fn name(&self) -> &str {
        "virustotal"
    }

    async fn fetch(&self, digest: &str) -> std::result::Result<ServiceResponse, TransportError> {
        log::debug!("Requesting report for {}", digest);

        let response = self
            .client
            .get(self.file_url(digest))
            .header("accept", "application/json")
            .header("x-apikey", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else if e.is_connect() {
                    TransportError::Connect(e.to_string())
                } else {
                    TransportError::Other(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Other(format!("Failed to read response body: {}", e))
            }
        })?;

        Ok(ServiceResponse { status, body })
    }
}
