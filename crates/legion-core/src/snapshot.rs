//! Balance snapshot types.
//!
//! Snapshots form a second, append-only ledger used for reconciliation and
//! audit. They are best-effort: the balance itself is strongly consistent,
//! the snapshot trail is eventually consistent with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, SnapshotId, TransactionId};

/// A point-in-time record of a balance change.
///
/// Never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    /// Unique snapshot ID.
    pub id: SnapshotId,

    /// The account whose balance changed.
    pub account_id: AccountId,

    /// The triggering transaction, when applicable.
    pub transaction_id: Option<TransactionId>,

    /// Balance before the change.
    pub balance_before: i64,

    /// Balance after the change.
    pub balance_after: i64,

    /// Signed change amount.
    pub delta: i64,

    /// Human-readable reason ("purchase", "generation", "generation refund", ...).
    pub reason: String,

    /// When the snapshot was recorded.
    pub created_at: DateTime<Utc>,
}

impl BalanceSnapshot {
    /// Create a snapshot for a balance change.
    #[must_use]
    pub fn new(
        account_id: AccountId,
        transaction_id: Option<TransactionId>,
        balance_before: i64,
        balance_after: i64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id: SnapshotId::generate(),
            account_id,
            transaction_id,
            balance_before,
            balance_after,
            delta: balance_after - balance_before,
            reason: reason.into(),
            created_at: Utc::now(),
        }
    }
}
