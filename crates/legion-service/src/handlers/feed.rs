//! Feed handlers.
//!
//! Read-through: the first page is served from the feed cache when warm;
//! a miss recomputes from the relational store and repopulates the cache.
//! Subsequent pages always read through, so tail pages are never cached.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use legion_core::{AccountId, FeedItem, FeedScope};
use legion_ledger::{CACHEABLE_PAGE, FEED_CACHE_SIZE};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Default page size.
const DEFAULT_LIMIT: usize = 20;

/// Maximum page size.
const MAX_LIMIT: usize = 50;

/// Pagination query parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: u32,

    /// Page size.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

const fn default_page() -> u32 {
    1
}

const fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Pagination {
    /// Clamped (limit, offset) pair for store queries.
    #[must_use]
    pub fn limit_offset(&self) -> (usize, usize) {
        let limit = self.limit.clamp(1, MAX_LIMIT);
        let offset = (self.page.max(1) as usize - 1) * limit;
        (limit, offset)
    }
}

/// A page of feed items.
#[derive(Debug, Serialize)]
pub struct FeedResponse {
    /// The items on this page.
    pub data: Vec<FeedItem>,

    /// Page number served.
    pub page: u32,

    /// Page size.
    pub limit: usize,

    /// Whether this page was served from the cache.
    pub cached: bool,
}

/// The caller's home feed: posts from accounts they follow.
pub async fn home_feed(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(pagination): Query<Pagination>,
) -> Result<Json<FeedResponse>, ApiError> {
    let viewer = auth.account_id;
    let scope = FeedScope::Home(viewer);
    serve_feed(&state, scope, pagination, move |state| async move {
        state
            .store
            .list_home_feed(&viewer, FEED_CACHE_SIZE)
            .await
            .map_err(ApiError::from)
    })
    .await
}

/// The shared explore feed: recent public posts.
pub async fn explore_feed(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<FeedResponse>, ApiError> {
    serve_feed(&state, FeedScope::Explore, pagination, move |state| async move {
        state
            .store
            .list_explore_feed(FEED_CACHE_SIZE)
            .await
            .map_err(ApiError::from)
    })
    .await
}

/// A single account's public posts.
pub async fn user_feed(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<String>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<FeedResponse>, ApiError> {
    let account_id: AccountId = account_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid account id".into()))?;

    let scope = FeedScope::UserProfile(account_id);
    serve_feed(&state, scope, pagination, move |state| async move {
        state
            .store
            .list_profile_feed(&account_id, FEED_CACHE_SIZE)
            .await
            .map_err(ApiError::from)
    })
    .await
}

/// Shared read-through logic for all three scopes.
async fn serve_feed<F, Fut>(
    state: &Arc<AppState>,
    scope: FeedScope,
    pagination: Pagination,
    recompute: F,
) -> Result<Json<FeedResponse>, ApiError>
where
    F: FnOnce(Arc<AppState>) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<FeedItem>, ApiError>>,
{
    let page = pagination.page.max(1);
    let (limit, offset) = pagination.limit_offset();

    // Only the first page is ever cache-eligible.
    if page == CACHEABLE_PAGE {
        if let Some(items) = state.feed.get(&scope).await {
            let data = items.into_iter().take(limit).collect();
            return Ok(Json(FeedResponse {
                data,
                page,
                limit,
                cached: true,
            }));
        }
    }

    let items = recompute(Arc::clone(state)).await?;

    if page == CACHEABLE_PAGE && !items.is_empty() {
        state.feed.put(&scope, &items).await;
    }

    let data = items.into_iter().skip(offset).take(limit).collect();
    Ok(Json(FeedResponse {
        data,
        page,
        limit,
        cached: false,
    }))
}
