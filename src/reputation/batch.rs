//! Paced, strictly sequential lookup of a queue of digests.

use crate::core::error::{Error, Result};
use crate::reputation::client::LookupClient;
use crate::reputation::item::{LookupItem, LookupStatus};
use crate::reputation::quota::QuotaStatus;
use crate::utils::format::short_duration;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Cooperative cancellation signal for a batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect between items.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation has been requested.
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Batches with more items than this get a quota-impact warning.
pub const LARGE_BATCH: usize = 50;

/// Describe what a large batch will cost, or `None` for batches up to
/// [`LARGE_BATCH`] items.
pub fn large_batch_warning(count: usize, pacing: Duration, status: &QuotaStatus) -> Option<String> {
    if count <= LARGE_BATCH {
        return None;
    }
    let duration = pacing * count.saturating_sub(1) as u32;
    Some(format!(
        "Looking up {} digests uses {} of {} remaining daily requests ({} of {} monthly) and takes about {}",
        count,
        count,
        status.daily_remaining,
        count,
        status.monthly_remaining,
        short_duration(duration)
    ))
}

/// Lifecycle of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// Totals for a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub state: BatchState,
    pub total: usize,
    pub malicious: usize,
    pub suspicious: usize,
    /// Clean plus not found
    pub clean: usize,
    pub errors: usize,
    /// Items left queued by cancellation
    pub cancelled: usize,
}

impl BatchSummary {
    fn from_items(items: &[LookupItem], state: BatchState) -> Self {
        let count = |wanted: &[LookupStatus]| {
            items
                .iter()
                .filter(|item| wanted.contains(&item.status))
                .count()
        };
        Self {
            state,
            total: items.len(),
            malicious: count(&[LookupStatus::Malicious]),
            suspicious: count(&[LookupStatus::Suspicious]),
            clean: count(&[LookupStatus::Clean, LookupStatus::NotFound]),
            errors: count(&[LookupStatus::Error]),
            cancelled: count(&[LookupStatus::Queued, LookupStatus::Checking]),
        }
    }
}

/// Events sent while a batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { total: usize },
    /// The item at `index` is being looked up
    Checking { index: usize, item: LookupItem },
    /// The item at `index` reached its final status
    Updated { index: usize, item: LookupItem },
    /// Waiting before the next lookup
    Waiting { next_index: usize, delay: Duration },
    Finished(BatchSummary),
}

/// Drains a lookup queue one item at a time with a fixed gap between calls.
pub struct LookupBatchRunner {
    client: LookupClient,
    pacing: Duration,
    cancel: CancelToken,
}

impl LookupBatchRunner {
    pub fn new(client: LookupClient, pacing: Duration) -> Self {
        Self {
            client,
            pacing,
            cancel: CancelToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn client(&self) -> &LookupClient {
        &self.client
    }

    /// Look up every item in order, updating each in place.
    ///
    /// Per-item failures never abort the batch. The pacing gap is skipped
    /// after the last item and once the quota is exhausted.
    pub async fn run(
        &self,
        items: &mut [LookupItem],
        events: &mpsc::UnboundedSender<BatchEvent>,
    ) -> Result<BatchSummary> {
        if items.is_empty() {
            return Err(Error::EmptyQueue);
        }

        let total = items.len();
        log::info!(
            "Starting lookup batch of {} item(s) via {}",
            total,
            self.client.service_name()
        );
        let _ = events.send(BatchEvent::Started { total });

        let mut cancelled = false;
        let mut quota_exhausted = false;

        for index in 0..total {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let item = &mut items[index];
            item.status = LookupStatus::Checking;
            let _ = events.send(BatchEvent::Checking {
                index,
                item: item.clone(),
            });

            let outcome = self.client.lookup(&item.digest).await;
            if matches!(&outcome, Err(e) if e.is_quota_exhausted()) {
                quota_exhausted = true;
            }
            item.apply(&outcome);
            let _ = events.send(BatchEvent::Updated {
                index,
                item: item.clone(),
            });

            if index + 1 == total {
                break;
            }
            if !quota_exhausted {
                quota_exhausted = self
                    .client
                    .quota()
                    .status()
                    .map(|status| !status.can_make_request())
                    .unwrap_or(false);
            }
            if quota_exhausted || self.pacing.is_zero() {
                continue;
            }

            let _ = events.send(BatchEvent::Waiting {
                next_index: index + 1,
                delay: self.pacing,
            });
            tokio::select! {
                _ = tokio::time::sleep(self.pacing) => {}
                _ = self.cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
            }
        }

        let state = if cancelled {
            BatchState::Cancelled
        } else {
            BatchState::Completed
        };
        let summary = BatchSummary::from_items(items, state);
        log::info!(
            "Lookup batch {:?}: {} malicious, {} suspicious, {} clean, {} error(s), {} not run",
            state,
            summary.malicious,
            summary.suspicious,
            summary.clean,
            summary.errors,
            summary.cancelled
        );
        let _ = events.send(BatchEvent::Finished(summary));
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DigestKind;
    use crate::reputation::providers::MockProvider;
    use crate::reputation::quota::{QuotaLimits, QuotaStore};

    fn item(digest: &str) -> LookupItem {
        LookupItem::new(digest, DigestKind::Md5, format!("{}.bin", digest))
    }

    fn runner(mock: MockProvider, pacing: Duration) -> LookupBatchRunner {
        let quota = Arc::new(QuotaStore::in_memory(QuotaLimits::default()));
        LookupBatchRunner::new(LookupClient::new(Box::new(mock), quota), pacing)
    }

    #[tokio::test]
    async fn test_empty_queue_is_rejected() {
        let runner = runner(MockProvider::new(), Duration::ZERO);
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(matches!(
            runner.run(&mut [], &tx).await,
            Err(Error::EmptyQueue)
        ));
    }

    #[tokio::test]
    async fn test_events_in_order() {
        let runner = runner(MockProvider::new().with_report("a", 0, 1, 3), Duration::ZERO);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut items = vec![item("a"), item("b")];

        let summary = runner.run(&mut items, &tx).await.unwrap();
        assert_eq!(summary.suspicious, 1);
        assert_eq!(summary.clean, 1);
        assert_eq!(summary.state, BatchState::Completed);

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event {
                BatchEvent::Started { .. } => "started",
                BatchEvent::Checking { .. } => "checking",
                BatchEvent::Updated { .. } => "updated",
                BatchEvent::Waiting { .. } => "waiting",
                BatchEvent::Finished(_) => "finished",
            });
        }
        assert_eq!(
            kinds,
            vec!["started", "checking", "updated", "checking", "updated", "finished"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_pacing_leaves_rest_queued() {
        let runner = runner(MockProvider::new(), Duration::from_secs(16));
        let token = runner.cancel_token();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut items = vec![item("a"), item("b"), item("c")];

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            token.cancel();
        });

        let summary = runner.run(&mut items, &tx).await.unwrap();
        assert_eq!(summary.state, BatchState::Cancelled);
        assert_eq!(items[0].status, LookupStatus::NotFound);
        assert_eq!(items[1].status, LookupStatus::Queued);
        assert_eq!(items[2].status, LookupStatus::Queued);
        assert_eq!(summary.cancelled, 2);
    }

    #[test]
    fn test_large_batch_warning() {
        let status = QuotaStore::in_memory(QuotaLimits::default())
            .status()
            .unwrap();
        let pacing = Duration::from_secs(16);

        assert!(large_batch_warning(LARGE_BATCH, pacing, &status).is_none());

        let warning = large_batch_warning(LARGE_BATCH + 1, pacing, &status).unwrap();
        assert!(warning.contains("51 digests"));
        assert!(warning.contains("of 500 remaining daily"));
        // 50 gaps of 16 s.
        assert!(warning.ends_with("13m 20s"));
    }

    #[tokio::test]
    async fn test_cancel_token_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        token.cancelled().await;
        assert!(token.is_cancelled());
    }
}
