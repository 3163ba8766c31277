//! Webhook handlers for the payment processor and the identity provider.
//!
//! Both senders retry on any non-2xx, so a duplicate delivery must be
//! answered with success without reprocessing. Signature verification and
//! idempotency live in the reconciler/consumer; the handlers only lift the
//! raw body and headers out of the request.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use legion_ledger::{IdentityOutcome, WebhookOutcome};

use crate::error::ApiError;
use crate::state::AppState;

/// Payment processor signature header.
const PAYMENT_SIGNATURE_HEADER: &str = "x-wc-webhook-signature";

/// Payment processor delivery identifier header.
const PAYMENT_DELIVERY_HEADER: &str = "x-wc-webhook-delivery-id";

/// Identity provider signature header.
const IDENTITY_SIGNATURE_HEADER: &str = "x-identity-signature";

/// Identity provider delivery identifier header.
const IDENTITY_DELIVERY_HEADER: &str = "x-identity-delivery-id";

/// Payment webhook response.
#[derive(Debug, Serialize)]
pub struct PaymentWebhookResponse {
    /// Whether the webhook was accepted.
    pub received: bool,

    /// Credits added, when the order credited an account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_added: Option<i64>,

    /// New balance, when the order credited an account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<i64>,

    /// Order status echoed back for ignored orders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Handle payment processor webhooks.
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<PaymentWebhookResponse>, ApiError> {
    let signature = header_str(&headers, PAYMENT_SIGNATURE_HEADER);
    let delivery_id = header_str(&headers, PAYMENT_DELIVERY_HEADER);

    tracing::info!(
        delivery_id = ?delivery_id,
        "Received payment webhook"
    );

    let outcome = state.payments.process(&body, signature, delivery_id).await?;

    let response = match outcome {
        WebhookOutcome::Credited {
            credits_added,
            new_balance,
            ..
        } => PaymentWebhookResponse {
            received: true,
            credits_added: Some(credits_added),
            new_balance: Some(new_balance),
            status: None,
        },
        WebhookOutcome::AlreadyProcessed => PaymentWebhookResponse {
            received: true,
            credits_added: None,
            new_balance: None,
            status: None,
        },
        WebhookOutcome::Ignored { status } => PaymentWebhookResponse {
            received: true,
            credits_added: None,
            new_balance: None,
            status: Some(status),
        },
    };

    Ok(Json(response))
}

/// Identity webhook response.
#[derive(Debug, Serialize)]
pub struct IdentityWebhookResponse {
    /// Whether the event was accepted.
    pub received: bool,

    /// What the event did.
    pub outcome: &'static str,
}

/// Handle identity provider lifecycle events.
pub async fn identity_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<IdentityWebhookResponse>, ApiError> {
    let signature = header_str(&headers, IDENTITY_SIGNATURE_HEADER);
    let delivery_id = header_str(&headers, IDENTITY_DELIVERY_HEADER)
        .ok_or_else(|| ApiError::BadRequest("missing delivery identifier header".into()))?;

    tracing::info!(delivery_id = %delivery_id, "Received identity event");

    let outcome = state.identity.process(&body, signature, delivery_id).await?;

    let outcome = match outcome {
        IdentityOutcome::AccountCreated(_) => "account_created",
        IdentityOutcome::AccountUpdated(_) => "account_updated",
        IdentityOutcome::AccountDeleted(_) => "account_deleted",
        IdentityOutcome::AlreadyProcessed => "already_processed",
    };

    Ok(Json(IdentityWebhookResponse {
        received: true,
        outcome,
    }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
