//! Credit transaction types for legion.
//!
//! A transaction is an immutable audit record of a balance change. Its
//! status moves forward through the reconciliation state machine; past
//! fields are never overwritten except status and completion time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, TransactionId};

/// An audit record of a balance-affecting event.
///
/// Transactions use ULIDs so the audit trail is naturally time-ordered.
/// The external identifiers (`order_id`, `session_id`, `idempotency_key`)
/// are unique where present and carry the dedup guarantees for retried
/// external events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The account whose balance was affected.
    pub account_id: AccountId,

    /// Signed credit delta. Positive = credit, negative = debit.
    pub credits_delta: i64,

    /// Monetary amount paid in minor units; `None` for non-purchase deltas.
    pub amount_paid: Option<i64>,

    /// ISO currency code for `amount_paid`, when applicable.
    pub currency: Option<String>,

    /// External payment-processor order identifier (unique when present).
    pub order_id: Option<String>,

    /// Checkout session identifier (unique when present).
    pub session_id: Option<String>,

    /// Webhook delivery identifier used for deduplication (unique when present).
    pub idempotency_key: Option<String>,

    /// Current reconciliation status.
    pub status: TransactionStatus,

    /// Free-form metadata (package details, processor payload excerpts).
    pub metadata: serde_json::Value,

    /// When the transaction was created.
    pub created_at: DateTime<Utc>,

    /// When the transaction reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl CreditTransaction {
    /// Create a purchase transaction for an external order.
    #[must_use]
    pub fn purchase(
        account_id: AccountId,
        credits: i64,
        amount_paid: i64,
        currency: String,
        order_id: String,
        idempotency_key: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            account_id,
            credits_delta: credits,
            amount_paid: Some(amount_paid),
            currency: Some(currency),
            order_id: Some(order_id),
            session_id: None,
            idempotency_key: Some(idempotency_key),
            status: TransactionStatus::Pending,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Set metadata on the transaction.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Reconciliation status of a credit transaction.
///
/// Transitions are forward-only:
/// `pending -> processing -> {completed, failed} -> [refunded]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Created, not yet picked up.
    Pending,

    /// Being reconciled.
    Processing,

    /// Credits applied.
    Completed,

    /// Reconciliation failed; no credits applied.
    Failed,

    /// A completed transaction was later refunded.
    Refunded,
}

impl TransactionStatus {
    /// Whether a transition from `self` to `next` moves the state machine forward.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed | Self::Failed)
                | (Self::Completed, Self::Refunded)
        )
    }

    /// Wire representation, matching the relational enum.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }

    /// Parse the wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}
