//! Feed cache management.
//!
//! Serves a bounded-staleness view of aggregated feeds without recomputing
//! the full join on every request. Entries are never the source of truth:
//! a crash between a write and its invalidation call serves stale data for
//! at most the scope's TTL window, which is the accepted trade-off.

use std::sync::Arc;

use legion_core::{AccountId, FeedItem, FeedScope};
use legion_store::CacheStore;

/// Only the first page of a paginated feed is ever cached. Subsequent
/// pages always read through to the store, bounding cache memory.
pub const CACHEABLE_PAGE: u32 = 1;

/// How many items a cached feed snapshot holds.
pub const FEED_CACHE_SIZE: usize = 50;

/// Maintains per-scope materialized feed snapshots in the cache store.
///
/// Cache failures never fail a request: a read error degrades to a miss
/// and a write error is logged and dropped, because the relational store
/// can always rebuild the feed.
#[derive(Clone)]
pub struct FeedCacheManager {
    cache: Arc<dyn CacheStore>,
}

impl FeedCacheManager {
    /// Create a manager over the given cache store.
    #[must_use]
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        Self { cache }
    }

    /// Read-through lookup. `None` means the caller must recompute from
    /// the relational store.
    pub async fn get(&self, scope: &FeedScope) -> Option<Vec<FeedItem>> {
        let key = scope.cache_key();
        let cached = match self.cache.get(&key).await {
            Ok(cached) => cached?,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Feed cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&cached) {
            Ok(items) => Some(items),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Corrupt cached feed, treating as miss");
                None
            }
        }
    }

    /// Overwrite the scope's snapshot with the scope's fixed TTL.
    pub async fn put(&self, scope: &FeedScope, items: &[FeedItem]) {
        let key = scope.cache_key();
        let serialized = match serde_json::to_string(items) {
            Ok(serialized) => serialized,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to serialize feed for caching");
                return;
            }
        };

        if let Err(e) = self.cache.set(&key, &serialized, scope.ttl()).await {
            tracing::warn!(key = %key, error = %e, "Feed cache write failed");
        }
    }

    /// Explicitly delete a scope's snapshot.
    pub async fn invalidate(&self, scope: &FeedScope) {
        let key = scope.cache_key();
        if let Err(e) = self.cache.delete(&[key.as_str()]).await {
            tracing::warn!(key = %key, error = %e, "Feed cache invalidation failed");
        }
    }

    /// Invalidation trigger for a new post: the poster's own profile feed
    /// and the globally-shared explore feed.
    pub async fn invalidate_for_new_post(&self, author_id: &AccountId) {
        self.invalidate(&FeedScope::UserProfile(*author_id)).await;
        self.invalidate(&FeedScope::Explore).await;
    }

    /// Invalidation trigger for a new follow: the follower's home feed.
    pub async fn invalidate_for_new_follow(&self, follower_id: &AccountId) {
        self.invalidate(&FeedScope::Home(*follower_id)).await;
    }
}
