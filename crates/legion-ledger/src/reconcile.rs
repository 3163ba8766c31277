//! Payment reconciliation.
//!
//! Consumes payment-processor webhook events, verifies authenticity, and
//! maps paid orders to credit grants exactly once. The upstream sender
//! retries on any non-2xx or timeout, so the whole path must be safe to
//! call arbitrarily many times for the same delivery.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;

use legion_core::{
    CreditTransaction, LedgerError, Result, TransactionStatus,
};
use legion_store::{keys, CacheStore, LedgerStore};

use crate::crypto::{constant_time_eq, hmac_sha256_base64, sha256_hex};
use crate::ledger::CreditLedger;

/// How long a processed-delivery marker lives.
pub const MARKER_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Structured line-item metadata key carrying the credit quantity.
///
/// Takes precedence over parsing the product name.
pub const CREDITS_META_KEY: &str = "_legion_credits";

/// Processor order status that triggers crediting.
const PAID_STATUS: &str = "completed";

/// A payment-processor order payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentOrder {
    /// Processor-side order identifier.
    pub id: i64,

    /// Processor order status.
    pub status: String,

    /// Billing details; the email resolves the target account.
    pub billing: BillingDetails,

    /// Purchased line items.
    #[serde(default)]
    pub line_items: Vec<OrderLineItem>,

    /// Order total as a decimal string.
    #[serde(default)]
    pub total: String,

    /// ISO currency code.
    #[serde(default)]
    pub currency: String,

    /// When the order was paid, if the processor reports it.
    #[serde(default)]
    pub date_paid: Option<String>,
}

/// Billing details attached to an order.
#[derive(Debug, Clone, Deserialize)]
pub struct BillingDetails {
    /// Billing email, matched against the account's stored email.
    pub email: String,

    /// Billing first name.
    #[serde(default)]
    pub first_name: String,

    /// Billing last name.
    #[serde(default)]
    pub last_name: String,
}

/// One purchased line item.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderLineItem {
    /// Line item identifier.
    pub id: i64,

    /// Product name. Fallback source for the credit quantity.
    pub name: String,

    /// Quantity purchased.
    #[serde(default)]
    pub quantity: i64,

    /// Structured metadata entries.
    #[serde(default)]
    pub meta_data: Vec<OrderMeta>,
}

/// A key/value metadata entry on a line item.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderMeta {
    /// Metadata key.
    pub key: String,

    /// Metadata value.
    pub value: String,
}

/// What processing a webhook delivery amounted to.
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    /// The order was paid and the account was credited.
    Credited {
        /// The credited account.
        account_id: legion_core::AccountId,
        /// Credits added.
        credits_added: i64,
        /// Balance after the credit.
        new_balance: i64,
        /// Processor order identifier.
        order_id: i64,
    },

    /// This delivery was already processed; nothing was done.
    AlreadyProcessed,

    /// The order is not in a paid status; acknowledged and ignored.
    Ignored {
        /// The processor status that was ignored.
        status: String,
    },
}

/// Maps payment webhooks to credit grants exactly once.
#[derive(Clone)]
pub struct PaymentReconciler {
    store: Arc<dyn LedgerStore>,
    cache: Arc<dyn CacheStore>,
    ledger: CreditLedger,
    webhook_secret: Option<String>,
}

impl PaymentReconciler {
    /// Create a reconciler. With no secret configured, signature
    /// verification is skipped (development mode) with a warning.
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

    /// Process one webhook delivery.
    ///
    /// The idempotency marker is *claimed* with a set-if-absent write before
    /// the credit is applied, so two concurrent deliveries of the same
    /// payload cannot both credit. Any failure after the claim and before
    /// the credit lands releases the claim, so the sender's retry can
    /// succeed once the underlying problem is fixed.
    ///
    /// # Errors
    ///
    /// - `LedgerError::SignatureInvalid` if a secret is configured and the
    ///   signature is missing or wrong. No state change.
    /// - `LedgerError::Validation` if the payload is malformed or carries no
    ///   positive credit quantity. No credit applied.
    /// - `LedgerError::AccountNotFound` if no account matches the billing
    ///   email. The claim is released so a corrected retry can succeed.
    pub async fn process(
        &self,
        raw_body: &str,
        signature: Option<&str>,
        delivery_id: Option<&str>,
    ) -> Result<WebhookOutcome> {
        self.verify_signature(raw_body, signature)?;

        // Compute or extract the delivery identifier. The body digest
        // fallback still deduplicates byte-identical redeliveries.
        let delivery_id = delivery_id.map_or_else(|| sha256_hex(raw_body), String::from);
        let marker_key = keys::webhook_marker_key(&delivery_id);

        let claimed = self
            .cache
            .set_if_absent(&marker_key, "1", MARKER_TTL)
            .await
            .map_err(LedgerError::from)?;

        if !claimed {
            tracing::info!(delivery_id = %delivery_id, "Webhook delivery already processed");
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        match self.apply(raw_body, &delivery_id).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                // Release the claim: the credit never landed, and the
                // sender's retry must be allowed through.
                self.release_claim(&marker_key).await;
                Err(e)
            }
        }
    }

    /// Everything after the claim: parse, filter, extract, resolve, credit.
    async fn apply(&self, raw_body: &str, delivery_id: &str) -> Result<WebhookOutcome> {
        let order: PaymentOrder = serde_json::from_str(raw_body)
            .map_err(|e| LedgerError::Validation(format!("malformed order payload: {e}")))?;

        if order.status != PAID_STATUS {
            tracing::info!(
                order_id = %order.id,
                status = %order.status,
                "Order not paid yet, ignoring"
            );
            return Ok(WebhookOutcome::Ignored {
                status: order.status,
            });
        }

        let credits = extract_credits(&order).ok_or_else(|| {
            LedgerError::Validation(format!(
                "order {} carries no positive credit quantity",
                order.id
            ))
        })?;

        let account = self
            .store
            .get_account_by_email(&order.billing.email)
            .await?
            .ok_or_else(|| {
                tracing::warn!(
                    order_id = %order.id,
                    email = %order.billing.email,
                    "No account matches billing email"
                );
                LedgerError::AccountNotFound {
                    account_id: order.billing.email.clone(),
                }
            })?;

        let amount_paid = parse_minor_units(&order.total);
        let transaction = CreditTransaction::purchase(
            account.id,
            credits,
            amount_paid,
            order.currency.clone(),
            order.id.to_string(),
            delivery_id.to_string(),
        )
        .with_metadata(serde_json::json!({
            "billing_email": order.billing.email,
            "date_paid": order.date_paid,
        }));

        self.store.insert_transaction(&transaction).await?;
        self.store
            .set_transaction_status(&transaction.id, TransactionStatus::Processing, None)
            .await?;

        // The single Credit call for this delivery.
        let new_balance = self.ledger.credit(&account.id, credits).await?;

        self.store
            .set_transaction_status(
                &transaction.id,
                TransactionStatus::Completed,
                Some(Utc::now()),
            )
            .await?;

        self.ledger
            .record_snapshot(
                &account.id,
                Some(transaction.id),
                new_balance - credits,
                new_balance,
                "purchase",
            )
            .await;

        tracing::info!(
            order_id = %order.id,
            account_id = %account.id,
            credits_added = %credits,
            new_balance = %new_balance,
            transaction_id = %transaction.id,
            "Credits added from paid order"
        );

        Ok(WebhookOutcome::Credited {
            account_id: account.id,
            credits_added: credits,
            new_balance,
            order_id: order.id,
        })
    }

    fn verify_signature(&self, raw_body: &str, signature: Option<&str>) -> Result<()> {
        let Some(secret) = &self.webhook_secret else {
            tracing::warn!("Payment webhook secret not configured - skipping verification");
            return Ok(());
        };

        let signature = signature.ok_or(LedgerError::SignatureInvalid)?;
        let expected = hmac_sha256_base64(secret, raw_body);

        if constant_time_eq(&expected, signature) {
            Ok(())
        } else {
            tracing::warn!("Invalid payment webhook signature");
            Err(LedgerError::SignatureInvalid)
        }
    }

    async fn release_claim(&self, marker_key: &str) {
        if let Err(e) = self.cache.delete(&[marker_key]).await {
            tracing::error!(
                marker_key = %marker_key,
                error = %e,
                "Failed to release idempotency claim; retries of this delivery will be suppressed until the marker expires"
            );
        }
    }
}

/// Extract the credit quantity from an order's line items.
///
/// The structured metadata key takes precedence; the fallback pattern-match
/// on the product name is best-effort. Returns `None` unless a positive
/// quantity is found.
fn extract_credits(order: &PaymentOrder) -> Option<i64> {
    let item = order.line_items.iter().find(|item| {
        item.name.to_lowercase().contains("credits")
            || item.meta_data.iter().any(|meta| meta.key == CREDITS_META_KEY)
    })?;

    let credits = item
        .meta_data
        .iter()
        .find(|meta| meta.key == CREDITS_META_KEY)
        .and_then(|meta| meta.value.trim().parse::<i64>().ok())
        .or_else(|| first_integer(&item.name))?;

    (credits > 0).then_some(credits)
}

/// First run of ASCII digits embedded in a product name.
fn first_integer(name: &str) -> Option<i64> {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Convert a decimal total string to minor units.
#[allow(clippy::cast_possible_truncation)]
fn parse_minor_units(total: &str) -> i64 {
    total
        .parse::<f64>()
        .map(|value| (value * 100.0).round() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use legion_core::{Account, AccountId};
    use legion_store::{MemoryCache, MemoryLedgerStore};

    const SECRET: &str = "whsec_test";

    fn order_body(status: &str, email: &str, meta_credits: Option<i64>) -> String {
        let meta = meta_credits.map_or_else(
            || serde_json::json!([]),
            |credits| {
                serde_json::json!([{ "key": CREDITS_META_KEY, "value": credits.to_string() }])
            },
        );
        serde_json::json!({
            "id": 501,
            "status": status,
            "billing": { "email": email, "first_name": "Ada", "last_name": "L" },
            "line_items": [{
                "id": 1,
                "name": "Legion Credits Pack",
                "quantity": 1,
                "meta_data": meta,
            }],
            "total": "499.00",
            "currency": "INR",
            "date_paid": "2024-11-02T10:00:00"
        })
        .to_string()
    }

    async fn setup(balance: i64) -> (Arc<MemoryLedgerStore>, Arc<MemoryCache>, PaymentReconciler, Account) {
        let store = Arc::new(MemoryLedgerStore::new());
        let cache = Arc::new(MemoryCache::new());
        let mut account = Account::new(
            AccountId::generate(),
            "buyer".into(),
            "buyer@example.com".into(),
        );
        account.balance = balance;
        store.insert_account(&account).await.unwrap();

        let reconciler = PaymentReconciler::new(
            Arc::clone(&store) as Arc<dyn LedgerStore>,
            Arc::clone(&cache) as Arc<dyn CacheStore>,
            Some(SECRET.into()),
        );
        (store, cache, reconciler, account)
    }

    fn sign(body: &str) -> String {
        hmac_sha256_base64(SECRET, body)
    }

    #[tokio::test]
    async fn paid_order_credits_the_account_once() {
        let (store, _, reconciler, account) = setup(5).await;
        let body = order_body("completed", &account.email, Some(100));
        let signature = sign(&body);

        let outcome = reconciler
            .process(&body, Some(&signature), Some("delivery-1"))
            .await
            .unwrap();

        match outcome {
            WebhookOutcome::Credited {
                credits_added,
                new_balance,
                order_id,
                ..
            } => {
                assert_eq!(credits_added, 100);
                assert_eq!(new_balance, 105);
                assert_eq!(order_id, 501);
            }
            other => panic!("expected Credited, got {other:?}"),
        }

        let stored = store.get_account(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, 105);

        let transactions = store.list_transactions(&account.id, 10, 0).await.unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].status, TransactionStatus::Completed);
        assert_eq!(transactions[0].order_id.as_deref(), Some("501"));
        assert!(transactions[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_delivery_credits_exactly_once() {
        let (store, _, reconciler, account) = setup(5).await;
        let body = order_body("completed", &account.email, Some(100));
        let signature = sign(&body);

        reconciler
            .process(&body, Some(&signature), Some("delivery-1"))
            .await
            .unwrap();
        let second = reconciler
            .process(&body, Some(&signature), Some("delivery-1"))
            .await
            .unwrap();

        assert!(matches!(second, WebhookOutcome::AlreadyProcessed));
        let stored = store.get_account(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, 105);
    }

    #[tokio::test]
    async fn missing_delivery_header_still_deduplicates_identical_bodies() {
        let (store, _, reconciler, account) = setup(0).await;
        let body = order_body("completed", &account.email, Some(50));
        let signature = sign(&body);

        reconciler.process(&body, Some(&signature), None).await.unwrap();
        let second = reconciler.process(&body, Some(&signature), None).await.unwrap();

        assert!(matches!(second, WebhookOutcome::AlreadyProcessed));
        let stored = store.get_account(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, 50);
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected_with_no_state_change() {
        let (store, cache, reconciler, account) = setup(5).await;
        let body = order_body("completed", &account.email, Some(100));

        let err = reconciler
            .process(&body, Some("not-a-signature"), Some("delivery-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::SignatureInvalid));

        let missing = reconciler
            .process(&body, None, Some("delivery-1"))
            .await
            .unwrap_err();
        assert!(matches!(missing, LedgerError::SignatureInvalid));

        let stored = store.get_account(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, 5);
        // No claim was consumed either.
        assert_eq!(
            cache
                .get(&keys::webhook_marker_key("delivery-1"))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn unpaid_order_is_acknowledged_and_ignored() {
        let (store, _, reconciler, account) = setup(5).await;
        let body = order_body("processing", &account.email, Some(100));
        let signature = sign(&body);

        let outcome = reconciler
            .process(&body, Some(&signature), Some("delivery-1"))
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));

        let stored = store.get_account(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, 5);
    }

    #[tokio::test]
    async fn missing_credit_quantity_is_a_validation_error() {
        let (store, _, reconciler, account) = setup(5).await;
        // No meta and no digits in the product name.
        let body = serde_json::json!({
            "id": 502,
            "status": "completed",
            "billing": { "email": account.email },
            "line_items": [{ "id": 1, "name": "Credits", "meta_data": [] }],
            "total": "10.00",
            "currency": "INR"
        })
        .to_string();
        let signature = sign(&body);

        let err = reconciler
            .process(&body, Some(&signature), Some("delivery-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let stored = store.get_account(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, 5);
    }

    #[tokio::test]
    async fn unknown_email_releases_the_claim_so_a_retry_can_succeed() {
        let (store, _, reconciler, _) = setup(5).await;
        let body = order_body("completed", "nobody@example.com", Some(100));
        let signature = sign(&body);

        let err = reconciler
            .process(&body, Some(&signature), Some("delivery-3"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound { .. }));

        // The account appears (identity sync catches up), then the sender
        // retries the same delivery: it must succeed now.
        let late_account = Account::new(
            AccountId::generate(),
            "late".into(),
            "nobody@example.com".into(),
        );
        store.insert_account(&late_account).await.unwrap();

        let outcome = reconciler
            .process(&body, Some(&signature), Some("delivery-3"))
            .await
            .unwrap();
        assert!(matches!(outcome, WebhookOutcome::Credited { .. }));
    }

    #[tokio::test]
    async fn product_name_is_the_fallback_credit_source() {
        let (store, _, reconciler, account) = setup(0).await;
        let body = serde_json::json!({
            "id": 503,
            "status": "completed",
            "billing": { "email": account.email },
            "line_items": [{ "id": 1, "name": "500 Credits Pack", "meta_data": [] }],
            "total": "20.00",
            "currency": "INR"
        })
        .to_string();
        let signature = sign(&body);

        let outcome = reconciler
            .process(&body, Some(&signature), Some("delivery-4"))
            .await
            .unwrap();
        match outcome {
            WebhookOutcome::Credited { credits_added, .. } => assert_eq!(credits_added, 500),
            other => panic!("expected Credited, got {other:?}"),
        }
    }

    #[test]
    fn meta_key_takes_precedence_over_name_digits() {
        let body = serde_json::json!({
            "id": 504,
            "status": "completed",
            "billing": { "email": "x@example.com" },
            "line_items": [{
                "id": 1,
                "name": "100 Credits Pack",
                "meta_data": [{ "key": CREDITS_META_KEY, "value": "250" }],
            }],
            "total": "20.00",
            "currency": "INR"
        })
        .to_string();
        let order: PaymentOrder = serde_json::from_str(&body).unwrap();
        assert_eq!(extract_credits(&order), Some(250));
    }

    #[test]
    fn minor_units_parsing() {
        assert_eq!(parse_minor_units("499.00"), 49900);
        assert_eq!(parse_minor_units("0.50"), 50);
        assert_eq!(parse_minor_units("garbage"), 0);
    }
}
