//! Account types for legion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AccountId;

/// Credits granted to every new account on its first identity sync.
pub const WELCOME_GRANT_CREDITS: i64 = 100;

/// A platform account for a user.
///
/// The account tracks the credit balance, premium status, and the profile
/// fields synced from the identity provider. The balance is mutated
/// exclusively through the credit ledger's atomic operations; feature code
/// never writes it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The account ID (from the identity provider).
    pub id: AccountId,

    /// Unique username.
    pub username: String,

    /// Unique email address. Payment webhooks resolve accounts by this.
    pub email: String,

    /// Avatar image URL, if set.
    pub avatar_url: Option<String>,

    /// Profile bio, if set.
    pub bio: Option<String>,

    /// Current credit balance. Invariant: never negative.
    pub balance: i64,

    /// Whether the account has premium status.
    pub premium: bool,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account seeded with the welcome grant.
    #[must_use]
    pub fn new(id: AccountId, username: String, email: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            username,
            email,
            avatar_url: None,
            bio: None,
            balance: WELCOME_GRANT_CREDITS,
            premium: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the account can afford a debit of `amount` credits.
    #[must_use]
    pub fn has_sufficient_balance(&self, amount: i64) -> bool {
        self.balance >= amount
    }
}
