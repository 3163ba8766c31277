//! The key-value cache contract.

use async_trait::async_trait;
use std::time::Duration;

/// Result type for cache-store operations.
pub type CacheResult<T> = std::result::Result<T, crate::error::CacheError>;

/// The cache-store trait.
///
/// Covers the three cache uses in the core: feed snapshots (get/set/delete
/// with TTL), idempotency markers (`set_if_absent` as the atomic claim), and
/// the optimistic interaction queue (`push`/`pop_batch`, where the pop is
/// destructive so two drainers can never see the same record).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value by key. Expired entries read as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Set a value with a TTL, overwriting any existing entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Set a value with a TTL only if the key is absent.
    ///
    /// Returns `true` if the write claimed the key, `false` if another
    /// writer got there first. This is the compare-and-set primitive the
    /// webhook idempotency claim relies on.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool>;

    /// Delete the given keys. Missing keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    async fn delete(&self, keys: &[&str]) -> CacheResult<()>;

    /// Push a value onto the head of a list.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    async fn push(&self, key: &str, value: &str) -> CacheResult<()>;

    /// Destructively pop up to `max` values from the tail of a list,
    /// oldest first. An atomic pop: no record is ever handed to two callers.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails.
    async fn pop_batch(&self, key: &str, max: usize) -> CacheResult<Vec<String>>;
}
