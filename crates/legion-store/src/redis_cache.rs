//! Redis cache implementation.
//!
//! Implements [`CacheStore`] over a multiplexed async connection. The
//! idempotency claim maps to `SET NX EX` and the queue drain to `RPOP`
//! with a count, both atomic on the Redis side.

use async_trait::async_trait;
use std::time::Duration;

use crate::cache::{CacheResult, CacheStore};
use crate::error::CacheError;

/// Redis-backed cache store.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    /// Create a cache store from a Redis URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn open(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url).map_err(redis_err)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> CacheResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(redis_err)
    }
}

fn redis_err(e: redis::RedisError) -> CacheError {
    CacheError::Backend(e.to_string())
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn().await?;
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(redis_err)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool> {
        let mut conn = self.conn().await?;
        // SET NX returns nil when the key already exists.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, keys: &[&str]) -> CacheResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn push(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("LPUSH")
            .arg(key)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn pop_batch(&self, key: &str, max: usize) -> CacheResult<Vec<String>> {
        let mut conn = self.conn().await?;
        let values: Option<Vec<String>> = redis::cmd("RPOP")
            .arg(key)
            .arg(max)
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        Ok(values.unwrap_or_default())
    }
}
