//! Credit balance and transaction handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Serialize;

use legion_core::CreditTransaction;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

use super::feed::Pagination;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Current credit balance.
    pub balance: i64,
}

/// Get the caller's credit balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.ledger.balance(&auth.account_id).await?;
    Ok(Json(BalanceResponse { balance }))
}

/// Transaction list response.
#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    /// The caller's transactions, newest first.
    pub transactions: Vec<CreditTransaction>,
}

/// List the caller's credit transactions.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<TransactionListResponse>, ApiError> {
    let (limit, offset) = pagination.limit_offset();
    let transactions = state
        .store
        .list_transactions(&auth.account_id, limit, offset)
        .await?;

    Ok(Json(TransactionListResponse { transactions }))
}
