//! Optimistic interaction queue.
//!
//! Absorbs bursty like/unlike actions without a synchronous relational
//! write per action. Enqueued records live only in the cache store until a
//! drain lands them; that durability trade-off is acceptable for likes and
//! must not be reused for financial mutations.

use std::sync::Arc;

use legion_core::{AccountId, InteractionKind, LedgerError, PostId, QueuedInteraction, Result};
use legion_store::{keys, CacheStore, LedgerStore};

/// Result of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Records applied to the relational store.
    pub processed: usize,

    /// Records that failed to parse or apply. They are logged and dropped;
    /// one poisoned record never blocks the rest of a batch.
    pub failed: usize,
}

/// Buffers like/unlike actions and flushes them in batches.
#[derive(Clone)]
pub struct InteractionQueue {
    cache: Arc<dyn CacheStore>,
}

impl InteractionQueue {
    /// Create a queue over the given cache store.
    #[must_use]
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    /// Append an action and return immediately. The caller's response
    /// reflects the optimistic outcome before the relational write lands.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Cache` if the push fails; the caller should
    /// surface that rather than silently dropping the action.
    pub async fn enqueue(
        &self,
        account_id: AccountId,
        post_id: PostId,
        kind: InteractionKind,
    ) -> Result<()> {
        let record = QueuedInteraction::new(account_id, post_id, kind);
        let serialized = serde_json::to_string(&record)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;

        self.cache
            .push(keys::LIKE_QUEUE_KEY, &serialized)
            .await
            .map_err(LedgerError::from)?;

        tracing::debug!(
            account_id = %account_id,
            post_id = %post_id,
            kind = ?kind,
            "Interaction enqueued"
        );
        Ok(())
    }

    /// Pop up to `max_items` oldest records and apply each to the
    /// relational store.
    ///
    /// The pop is destructive and atomic, so concurrent drains split the
    /// backlog rather than double-processing; still, a single scheduled
    /// worker is the intended caller. Per-item failures are logged and
    /// counted without aborting the batch.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Cache` only if the pop itself fails.
    pub async fn drain_batch(
        &self,
        store: &dyn LedgerStore,
        max_items: usize,
    ) -> Result<DrainReport> {
        let records = self
            .cache
            .pop_batch(keys::LIKE_QUEUE_KEY, max_items)
            .await
            .map_err(LedgerError::from)?;

        let mut report = DrainReport::default();

        for raw in records {
            match self.apply(store, &raw).await {
                Ok(()) => report.processed += 1,
                Err(e) => {
                    tracing::warn!(error = %e, record = %raw, "Failed to apply queued interaction");
                    report.failed += 1;
                }
            }
        }

        if report.processed > 0 || report.failed > 0 {
            tracing::info!(
                processed = %report.processed,
                failed = %report.failed,
                "Drained interaction queue batch"
            );
        }

        Ok(report)
    }

    async fn apply(&self, store: &dyn LedgerStore, raw: &str) -> Result<()> {
        let record: QueuedInteraction = serde_json::from_str(raw)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;

        match record.kind {
            InteractionKind::Like => {
                store.insert_like(&record.account_id, &record.post_id).await?;
            }
            InteractionKind::Unlike => {
                store.delete_like(&record.account_id, &record.post_id).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use legion_store::{MemoryCache, MemoryLedgerStore};

    fn queue() -> (Arc<MemoryCache>, Arc<MemoryLedgerStore>, InteractionQueue) {
        let cache = Arc::new(MemoryCache::new());
        let store = Arc::new(MemoryLedgerStore::new());
        let queue = InteractionQueue::new(Arc::clone(&cache) as Arc<dyn CacheStore>);
        (cache, store, queue)
    }

    #[tokio::test]
    async fn enqueue_is_buffered_until_drained() {
        let (cache, store, queue) = queue();
        let account_id = AccountId::generate();
        let post_id = PostId::generate();

        queue
            .enqueue(account_id, post_id, InteractionKind::Like)
            .await
            .unwrap();

        assert_eq!(cache.list_len(keys::LIKE_QUEUE_KEY), 1);
        assert!(!store.like_exists(&account_id, &post_id));

        let report = queue.drain_batch(store.as_ref(), 100).await.unwrap();
        assert_eq!(report, DrainReport { processed: 1, failed: 0 });
        assert!(store.like_exists(&account_id, &post_id));
        assert_eq!(cache.list_len(keys::LIKE_QUEUE_KEY), 0);
    }

    #[tokio::test]
    async fn like_then_unlike_nets_out() {
        let (_, store, queue) = queue();
        let account_id = AccountId::generate();
        let post_id = PostId::generate();

        queue
            .enqueue(account_id, post_id, InteractionKind::Like)
            .await
            .unwrap();
        queue
            .enqueue(account_id, post_id, InteractionKind::Unlike)
            .await
            .unwrap();

        let report = queue.drain_batch(store.as_ref(), 100).await.unwrap();
        assert_eq!(report.processed, 2);
        assert!(!store.like_exists(&account_id, &post_id));
    }

    #[tokio::test]
    async fn poisoned_record_does_not_abort_the_batch() {
        let (cache, store, queue) = queue();
        let first = AccountId::generate();
        let second = AccountId::generate();
        let post_id = PostId::generate();

        queue
            .enqueue(first, post_id, InteractionKind::Like)
            .await
            .unwrap();
        cache.push(keys::LIKE_QUEUE_KEY, "{corrupt").await.unwrap();
        queue
            .enqueue(second, post_id, InteractionKind::Like)
            .await
            .unwrap();

        let report = queue.drain_batch(store.as_ref(), 100).await.unwrap();
        assert_eq!(report, DrainReport { processed: 2, failed: 1 });
        assert!(store.like_exists(&first, &post_id));
        assert!(store.like_exists(&second, &post_id));
    }

    #[tokio::test]
    async fn drain_respects_the_batch_limit() {
        let (cache, store, queue) = queue();
        let post_id = PostId::generate();
        for _ in 0..5 {
            queue
                .enqueue(AccountId::generate(), post_id, InteractionKind::Like)
                .await
                .unwrap();
        }

        let report = queue.drain_batch(store.as_ref(), 3).await.unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(cache.list_len(keys::LIKE_QUEUE_KEY), 2);

        let rest = queue.drain_batch(store.as_ref(), 3).await.unwrap();
        assert_eq!(rest.processed, 2);
    }

    #[tokio::test]
    async fn duplicate_like_applies_are_noops() {
        let (_, store, queue) = queue();
        let account_id = AccountId::generate();
        let post_id = PostId::generate();

        queue
            .enqueue(account_id, post_id, InteractionKind::Like)
            .await
            .unwrap();
        queue
            .enqueue(account_id, post_id, InteractionKind::Like)
            .await
            .unwrap();
        // Unlike of something never liked is also fine.
        queue
            .enqueue(AccountId::generate(), post_id, InteractionKind::Unlike)
            .await
            .unwrap();

        let report = queue.drain_batch(store.as_ref(), 100).await.unwrap();
        assert_eq!(report, DrainReport { processed: 3, failed: 0 });
        assert!(store.like_exists(&account_id, &post_id));
    }
}
