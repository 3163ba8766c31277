//! Core types and utilities for legion.
//!
//! This crate provides the foundational types used throughout the legion
//! platform:
//!
//! - **Identifiers**: `AccountId`, `TransactionId`, `JobId`, `PostId`, `SnapshotId`
//! - **Accounts**: `Account` and the welcome grant
//! - **Credits**: `CreditTransaction`, `TransactionStatus`, `BalanceSnapshot`
//! - **Generation**: `GenerationJob`, `GenerationKind`, `JobStatus`
//! - **Feeds**: `FeedScope`, `FeedItem`
//! - **Interactions**: `QueuedInteraction`, `InteractionKind`
//!
//! # Credits
//!
//! Credits are the spendable quota for AI generation, stored as `i64`.
//! An account's balance is never negative; every change flows through the
//! ledger's atomic debit/credit operations and is mirrored into an
//! append-only snapshot ledger for reconciliation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod error;
pub mod feed;
pub mod generation;
pub mod ids;
pub mod interaction;
pub mod post;
pub mod snapshot;
pub mod transaction;

pub use account::{Account, WELCOME_GRANT_CREDITS};
pub use error::{LedgerError, Result};
pub use feed::{FeedItem, FeedScope};
pub use generation::{GenerationJob, GenerationKind, JobStatus};
pub use ids::{AccountId, IdError, JobId, PostId, SnapshotId, TransactionId};
pub use interaction::{InteractionKind, QueuedInteraction};
pub use post::{Post, Visibility};
pub use snapshot::BalanceSnapshot;
pub use transaction::{CreditTransaction, TransactionStatus};
