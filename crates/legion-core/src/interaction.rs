//! Optimistic interaction types.
//!
//! Likes and unlikes are buffered in the cache store and applied to the
//! relational store in batches. A queued record is small and self-contained
//! so a single malformed entry can be skipped without affecting the rest of
//! a batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, PostId};

/// The kind of buffered interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// Insert a like row (duplicate insert is a no-op).
    Like,

    /// Delete the matching like row (absence is a no-op).
    Unlike,
}

/// A buffered like/unlike action awaiting a batch drain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedInteraction {
    /// The acting account.
    pub account_id: AccountId,

    /// The target post.
    pub post_id: PostId,

    /// Like or unlike.
    pub kind: InteractionKind,

    /// When the action was enqueued.
    pub queued_at: DateTime<Utc>,
}

impl QueuedInteraction {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn new(account_id: AccountId, post_id: PostId, kind: InteractionKind) -> Self {
        Self {
            account_id,
            post_id,
            kind,
            queued_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_interaction_serde_roundtrip() {
        let record = QueuedInteraction::new(
            AccountId::generate(),
            PostId::generate(),
            InteractionKind::Like,
        );
        let json = serde_json::to_string(&record).unwrap();
        let parsed: QueuedInteraction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.account_id, record.account_id);
        assert_eq!(parsed.post_id, record.post_id);
        assert_eq!(parsed.kind, InteractionKind::Like);
    }
}
