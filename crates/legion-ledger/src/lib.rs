//! Credit ledger and accounting core for legion.
//!
//! This crate implements the subsystems with real correctness hazards:
//!
//! - [`CreditLedger`]: atomic debit/credit over the relational store plus
//!   the best-effort snapshot audit trail.
//! - [`GenerationService`]: debit-before-call orchestration of AI
//!   generation jobs with a compensating refund on failure.
//! - [`PaymentReconciler`]: at-most-once processing of signed payment
//!   webhooks into credit grants.
//! - [`IdentityConsumer`]: idempotent consumption of identity-provider
//!   lifecycle events (account creation seeds the welcome grant).
//! - [`FeedCacheManager`]: bounded-staleness feed snapshots with explicit
//!   invalidation triggers.
//! - [`InteractionQueue`]: optimistic buffering of like/unlike actions,
//!   drained to the relational store in batches.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod crypto;
pub mod feed;
pub mod generation;
pub mod identity;
pub mod ledger;
pub mod queue;
pub mod reconcile;

pub use feed::{FeedCacheManager, CACHEABLE_PAGE, FEED_CACHE_SIZE};
pub use generation::{
    AiProvider, GenerationOutcome, GenerationRequest, GenerationResult, GenerationService,
    ProviderError,
};
pub use identity::{IdentityConsumer, IdentityEvent, IdentityEventKind, IdentityOutcome};
pub use ledger::CreditLedger;
pub use queue::{DrainReport, InteractionQueue};
pub use reconcile::{PaymentOrder, PaymentReconciler, WebhookOutcome};
