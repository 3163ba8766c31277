//! Identity-provider event consumption.
//!
//! Account lifecycle events arrive as signed webhook deliveries and are
//! consumed with the same verify-then-claim pattern as payment webhooks.
//! The core only maintains the resulting account row; the identity protocol
//! itself stays with the provider.

use std::sync::Arc;

use serde::Deserialize;

use legion_core::{Account, AccountId, LedgerError, Result, WELCOME_GRANT_CREDITS};
use legion_store::{keys, CacheStore, LedgerStore};

use crate::crypto::{constant_time_eq, hmac_sha256_hex};
use crate::ledger::CreditLedger;
use crate::reconcile::MARKER_TTL;

/// An identity lifecycle event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum IdentityEventKind {
    /// A user signed up.
    #[serde(rename = "user.created")]
    Created,

    /// Profile fields changed.
    #[serde(rename = "user.updated")]
    Updated,

    /// The user was deleted upstream.
    #[serde(rename = "user.deleted")]
    Deleted,
}

/// An identity lifecycle event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityEvent {
    /// The event kind.
    #[serde(rename = "type")]
    pub kind: IdentityEventKind,

    /// The subject payload.
    pub data: IdentitySubject,
}

/// The user data carried by an identity event.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentitySubject {
    /// The provider-side user identifier; becomes the account ID.
    pub id: String,

    /// Email address.
    #[serde(default)]
    pub email: Option<String>,

    /// Username, if chosen.
    #[serde(default)]
    pub username: Option<String>,

    /// Avatar image URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// What consuming an identity event amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityOutcome {
    /// A new account was created with the welcome grant.
    AccountCreated(AccountId),

    /// Profile fields were updated.
    AccountUpdated(AccountId),

    /// The account was deleted.
    AccountDeleted(AccountId),

    /// This delivery was already processed; nothing was done.
    AlreadyProcessed,
}

/// Consumes identity lifecycle events idempotently.
#[derive(Clone)]
pub struct IdentityConsumer {
    store: Arc<dyn LedgerStore>,
    cache: Arc<dyn CacheStore>,
    ledger: CreditLedger,
    webhook_secret: Option<String>,
}

impl IdentityConsumer {
    /// Create a consumer. With no secret configured, signature verification
    /// is skipped (development mode) with a warning.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        cache: Arc<dyn CacheStore>,
        webhook_secret: Option<String>,
    ) -> Self {
        let ledger = CreditLedger::new(Arc::clone(&store));
        Self {
            store,
            cache,
            ledger,
            webhook_secret,
        }
    }

    /// Process one identity event delivery.
    ///
    /// # Errors
    ///
    /// - `LedgerError::SignatureInvalid` on a missing or wrong signature.
    /// - `LedgerError::Validation` on a malformed payload or identifier.
    pub async fn process(
        &self,
        raw_body: &str,
        signature: Option<&str>,
        delivery_id: &str,
    ) -> Result<IdentityOutcome> {
        self.verify_signature(raw_body, signature)?;

        let marker_key = keys::webhook_marker_key(delivery_id);
        let claimed = self
            .cache
            .set_if_absent(&marker_key, "1", MARKER_TTL)
            .await
            .map_err(LedgerError::from)?;

        if !claimed {
            tracing::info!(delivery_id = %delivery_id, "Identity event already processed");
            return Ok(IdentityOutcome::AlreadyProcessed);
        }

        match self.apply(raw_body).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                if let Err(release_err) = self.cache.delete(&[marker_key.as_str()]).await {
                    tracing::error!(
                        marker_key = %marker_key,
                        error = %release_err,
                        "Failed to release identity event claim"
                    );
                }
                Err(e)
            }
        }
    }

    async fn apply(&self, raw_body: &str) -> Result<IdentityOutcome> {
        let event: IdentityEvent = serde_json::from_str(raw_body)
            .map_err(|e| LedgerError::Validation(format!("malformed identity event: {e}")))?;

        let account_id: AccountId = event
            .data
            .id
            .parse()
            .map_err(|_| LedgerError::Validation(format!("invalid account id: {}", event.data.id)))?;

        match event.kind {
            IdentityEventKind::Created => self.create_account(account_id, &event.data).await,
            IdentityEventKind::Updated => {
                self.store
                    .update_account_profile(
                        &account_id,
                        event.data.username.as_deref(),
                        event.data.email.as_deref(),
                        event.data.avatar_url.as_deref(),
                    )
                    .await?;
                tracing::info!(account_id = %account_id, "Account profile updated");
                Ok(IdentityOutcome::AccountUpdated(account_id))
            }
            IdentityEventKind::Deleted => {
                self.store.delete_account(&account_id).await?;
                tracing::info!(account_id = %account_id, "Account deleted");
                Ok(IdentityOutcome::AccountDeleted(account_id))
            }
        }
    }

    async fn create_account(
        &self,
        account_id: AccountId,
        subject: &IdentitySubject,
    ) -> Result<IdentityOutcome> {
        let email = subject
            .email
            .clone()
            .ok_or_else(|| LedgerError::Validation("user.created event without email".into()))?;

        // Default username mirrors the provider's convention for users who
        // have not picked one yet.
        let username = subject.username.clone().unwrap_or_else(|| {
            let id_str = account_id.to_string();
            format!("user_{}", &id_str[..8])
        });

        let mut account = Account::new(account_id, username, email);
        account.avatar_url = subject.avatar_url.clone();
        self.store.insert_account(&account).await?;

        self.ledger
            .record_snapshot(&account_id, None, 0, WELCOME_GRANT_CREDITS, "welcome grant")
            .await;

        tracing::info!(
            account_id = %account_id,
            balance = %account.balance,
            "Account created with welcome grant"
        );
        Ok(IdentityOutcome::AccountCreated(account_id))
    }

    fn verify_signature(&self, raw_body: &str, signature: Option<&str>) -> Result<()> {
        let Some(secret) = &self.webhook_secret else {
            tracing::warn!("Identity webhook secret not configured - skipping verification");
            return Ok(());
        };

        let signature = signature.ok_or(LedgerError::SignatureInvalid)?;
        let expected = hmac_sha256_hex(secret, raw_body);

        if constant_time_eq(&expected, signature) {
            Ok(())
        } else {
            tracing::warn!("Invalid identity webhook signature");
            Err(LedgerError::SignatureInvalid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use legion_store::{MemoryCache, MemoryLedgerStore};

    const SECRET: &str = "idsec_test";

    fn created_body(account_id: &AccountId) -> String {
        serde_json::json!({
            "type": "user.created",
            "data": {
                "id": account_id.to_string(),
                "email": "new@example.com",
                "username": "newbie",
                "avatar_url": "https://img.example.com/a.png"
            }
        })
        .to_string()
    }

    fn consumer() -> (Arc<MemoryLedgerStore>, IdentityConsumer) {
        let store = Arc::new(MemoryLedgerStore::new());
        let cache = Arc::new(MemoryCache::new());
        let consumer = IdentityConsumer::new(
            Arc::clone(&store) as Arc<dyn LedgerStore>,
            cache as Arc<dyn CacheStore>,
            Some(SECRET.into()),
        );
        (store, consumer)
    }

    #[tokio::test]
    async fn created_event_seeds_the_welcome_grant() {
        let (store, consumer) = consumer();
        let account_id = AccountId::generate();
        let body = created_body(&account_id);
        let signature = hmac_sha256_hex(SECRET, &body);

        let outcome = consumer
            .process(&body, Some(&signature), "evt-1")
            .await
            .unwrap();
        assert_eq!(outcome, IdentityOutcome::AccountCreated(account_id));

        let account = store.get_account(&account_id).await.unwrap().unwrap();
        assert_eq!(account.balance, WELCOME_GRANT_CREDITS);
        assert_eq!(account.username, "newbie");

        let snapshots = store.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].reason, "welcome grant");
        assert_eq!(snapshots[0].delta, WELCOME_GRANT_CREDITS);
    }

    #[tokio::test]
    async fn duplicate_delivery_creates_one_account() {
        let (store, consumer) = consumer();
        let account_id = AccountId::generate();
        let body = created_body(&account_id);
        let signature = hmac_sha256_hex(SECRET, &body);

        consumer.process(&body, Some(&signature), "evt-1").await.unwrap();
        let second = consumer
            .process(&body, Some(&signature), "evt-1")
            .await
            .unwrap();
        assert_eq!(second, IdentityOutcome::AlreadyProcessed);

        assert_eq!(store.snapshots().len(), 1);
    }

    #[tokio::test]
    async fn updated_event_touches_profile_not_balance() {
        let (store, consumer) = consumer();
        let account_id = AccountId::generate();
        let body = created_body(&account_id);
        let signature = hmac_sha256_hex(SECRET, &body);
        consumer.process(&body, Some(&signature), "evt-1").await.unwrap();

        let update = serde_json::json!({
            "type": "user.updated",
            "data": { "id": account_id.to_string(), "username": "renamed" }
        })
        .to_string();
        let signature = hmac_sha256_hex(SECRET, &update);
        consumer
            .process(&update, Some(&signature), "evt-2")
            .await
            .unwrap();

        let account = store.get_account(&account_id).await.unwrap().unwrap();
        assert_eq!(account.username, "renamed");
        assert_eq!(account.email, "new@example.com");
        assert_eq!(account.balance, WELCOME_GRANT_CREDITS);
    }

    #[tokio::test]
    async fn deleted_event_removes_the_account() {
        let (store, consumer) = consumer();
        let account_id = AccountId::generate();
        let body = created_body(&account_id);
        let signature = hmac_sha256_hex(SECRET, &body);
        consumer.process(&body, Some(&signature), "evt-1").await.unwrap();

        let delete = serde_json::json!({
            "type": "user.deleted",
            "data": { "id": account_id.to_string() }
        })
        .to_string();
        let signature = hmac_sha256_hex(SECRET, &delete);
        let outcome = consumer
            .process(&delete, Some(&signature), "evt-3")
            .await
            .unwrap();
        assert_eq!(outcome, IdentityOutcome::AccountDeleted(account_id));

        assert!(store.get_account(&account_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_signature_is_rejected() {
        let (store, consumer) = consumer();
        let account_id = AccountId::generate();
        let body = created_body(&account_id);

        let err = consumer
            .process(&body, Some("deadbeef"), "evt-1")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SignatureInvalid));
        assert!(store.get_account(&account_id).await.unwrap().is_none());
    }
}
