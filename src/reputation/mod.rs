//! Quota-gated reputation lookups for computed digests.
//!
//! This module provides:
//! - Persisted daily/monthly usage quota with integrity checks
//! - A single-lookup client with a fixed outcome taxonomy
//! - A paced, cancellable batch runner
//! - API key storage

pub mod apikey;
pub mod batch;
pub mod client;
pub mod item;
pub mod providers;
pub mod quota;

pub use apikey::{ApiKeyStore, KeySource};
pub use batch::{
    large_batch_warning, BatchEvent, BatchState, BatchSummary, CancelToken, LookupBatchRunner,
    LARGE_BATCH,
};
pub use client::{LookupClient, LookupError, LookupOutcome, Verdict};
pub use item::{DetectionCounts, LookupItem, LookupStatus};
pub use providers::{create_provider, MockProvider, ReputationService, VirusTotalProvider};
pub use quota::{QuotaLimits, QuotaRecord, QuotaStatus, QuotaStore};
