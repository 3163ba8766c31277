//! In-memory cache store.
//!
//! A test backend implementing [`CacheStore`] with real TTL expiry
//! (checked lazily on access) and mutex-guarded lists, so feed caching,
//! idempotency claims, and queue drains behave like the Redis backend.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::cache::{CacheResult, CacheStore};

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    lists: HashMap<String, VecDeque<String>>,
}

/// In-memory implementation of [`CacheStore`].
#[derive(Default)]
pub struct MemoryCache {
    inner: Mutex<Inner>,
}

impl MemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of records currently queued on a list. Test inspection helper.
    #[must_use]
    pub fn list_len(&self, key: &str) -> usize {
        self.lock().lists.get(key).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut inner = self.lock();
        match inner.entries.get(key) {
            Some(entry) if !entry.is_expired() => Ok(Some(entry.value.clone())),
            Some(_) => {
                inner.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.lock().entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        let mut inner = self.lock();
        let live = inner.entries.get(key).is_some_and(|e| !e.is_expired());
        if live {
            return Ok(false);
        }
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(true)
    }

    async fn delete(&self, keys: &[&str]) -> CacheResult<()> {
        let mut inner = self.lock();
        for key in keys {
            inner.entries.remove(*key);
        }
        Ok(())
    }

    async fn push(&self, key: &str, value: &str) -> CacheResult<()> {
        self.lock()
            .lists
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_string());
        Ok(())
    }

    async fn pop_batch(&self, key: &str, max: usize) -> CacheResult<Vec<String>> {
        let mut inner = self.lock();
        let Some(list) = inner.lists.get_mut(key) else {
            return Ok(Vec::new());
        };
        let mut popped = Vec::new();
        while popped.len() < max {
            match list.pop_back() {
                Some(value) => popped.push(value),
                None => break,
            }
        }
        Ok(popped)
    }
}
