//! Storage layer for legion.
//!
//! This crate provides the two collaborator contracts the core depends on,
//! each with a production backend and an in-memory backend for tests:
//!
//! - [`LedgerStore`]: the relational store holding accounts, transactions,
//!   snapshots, generation jobs, and the social rows the feed queries join.
//!   Backed by PostgreSQL ([`PgLedgerStore`]) or memory ([`MemoryLedgerStore`]).
//! - [`CacheStore`]: the low-latency key-value store used for feed caching,
//!   idempotency markers, and the optimistic interaction queue. Backed by
//!   Redis ([`RedisCache`]) or memory ([`MemoryCache`]).
//!
//! All cross-request coordination lives in the stores' atomicity guarantees
//! (conditional row updates, set-if-absent, destructive pops); the service
//! runs as multiple stateless instances and holds no in-process locks.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cache;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod memory;
pub mod memory_cache;
pub mod postgres;
pub mod redis_cache;

pub use cache::CacheStore;
pub use error::{CacheError, Result, StoreError};
pub use ledger::LedgerStore;
pub use memory::MemoryLedgerStore;
pub use memory_cache::MemoryCache;
pub use postgres::PgLedgerStore;
pub use redis_cache::RedisCache;
