//! Post, like, and follow handlers.
//!
//! Post and follow mutations invalidate the affected feed scopes
//! synchronously. Likes take the optimistic path: they are acknowledged
//! immediately and land in the relational store at the next queue drain.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use legion_core::{AccountId, InteractionKind, JobId, Post, PostId, Visibility};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Post creation request body.
#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    /// Generation job to attach, if any.
    #[serde(default)]
    pub generation_id: Option<String>,

    /// Caption text.
    #[serde(default)]
    pub caption: Option<String>,

    /// Who can see the post. Defaults to public.
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,
}

const fn default_visibility() -> Visibility {
    Visibility::Public
}

/// Post creation response.
#[derive(Debug, Serialize)]
pub struct PostResponse {
    /// The created post's identifier.
    pub id: String,

    /// The posting account.
    pub account_id: String,

    /// Caption text.
    pub caption: Option<String>,

    /// Visibility.
    pub visibility: Visibility,

    /// When the post was created.
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Create a post, invalidating the poster's profile feed and explore.
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreatePostRequest>,
) -> Result<Json<PostResponse>, ApiError> {
    let generation_id = body
        .generation_id
        .as_deref()
        .map(str::parse::<JobId>)
        .transpose()
        .map_err(|_| ApiError::BadRequest("invalid generation id".into()))?;

    // An attached generation must exist, belong to the poster, and have a
    // result to show.
    if let Some(generation_id) = generation_id {
        let job = state
            .store
            .get_job(&generation_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("generation job not found: {generation_id}")))?;
        if job.account_id != auth.account_id {
            return Err(ApiError::NotFound(format!(
                "generation job not found: {generation_id}"
            )));
        }
        if job.result_url.is_none() {
            return Err(ApiError::BadRequest(
                "generation has no result to post".into(),
            ));
        }
    }

    let post = Post::new(auth.account_id, generation_id, body.caption, body.visibility);
    state.store.insert_post(&post).await?;

    // Synchronous invalidation: the next read of either scope recomputes.
    state.feed.invalidate_for_new_post(&auth.account_id).await;

    tracing::info!(
        post_id = %post.id,
        account_id = %auth.account_id,
        "Post created"
    );

    Ok(Json(PostResponse {
        id: post.id.to_string(),
        account_id: post.account_id.to_string(),
        caption: post.caption,
        visibility: post.visibility,
        created_at: post.created_at,
    }))
}

/// Like/unlike acknowledgement.
#[derive(Debug, Serialize)]
pub struct InteractionResponse {
    /// The action was buffered; the relational write lands at the next
    /// drain.
    pub queued: bool,

    /// The optimistic like state reflected back to the caller.
    pub liked: bool,
}

/// Enqueue a like.
pub async fn like_post(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(post_id): Path<String>,
) -> Result<Json<InteractionResponse>, ApiError> {
    enqueue_interaction(&state, auth.account_id, &post_id, InteractionKind::Like).await?;
    Ok(Json(InteractionResponse {
        queued: true,
        liked: true,
    }))
}

/// Enqueue an unlike.
pub async fn unlike_post(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(post_id): Path<String>,
) -> Result<Json<InteractionResponse>, ApiError> {
    enqueue_interaction(&state, auth.account_id, &post_id, InteractionKind::Unlike).await?;
    Ok(Json(InteractionResponse {
        queued: true,
        liked: false,
    }))
}

async fn enqueue_interaction(
    state: &AppState,
    account_id: AccountId,
    post_id: &str,
    kind: InteractionKind,
) -> Result<(), ApiError> {
    let post_id: PostId = post_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid post id".into()))?;

    state.likes.enqueue(account_id, post_id, kind).await?;
    Ok(())
}

/// Follow acknowledgement.
#[derive(Debug, Serialize)]
pub struct FollowResponse {
    /// Whether the caller now follows the target.
    pub following: bool,
}

/// Follow an account, invalidating the caller's home feed.
pub async fn follow(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(account_id): Path<String>,
) -> Result<Json<FollowResponse>, ApiError> {
    let followee = parse_followee(&auth, &account_id)?;

    state
        .store
        .get_account(&followee)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("account not found: {followee}")))?;

    state.store.insert_follow(&auth.account_id, &followee).await?;
    state.feed.invalidate_for_new_follow(&auth.account_id).await;

    Ok(Json(FollowResponse { following: true }))
}

/// Unfollow an account. The home feed is invalidated here too, so removed
/// authors drop out within one read rather than one TTL.
pub async fn unfollow(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(account_id): Path<String>,
) -> Result<Json<FollowResponse>, ApiError> {
    let followee = parse_followee(&auth, &account_id)?;

    state.store.delete_follow(&auth.account_id, &followee).await?;
    state.feed.invalidate_for_new_follow(&auth.account_id).await;

    Ok(Json(FollowResponse { following: false }))
}

fn parse_followee(auth: &AuthUser, account_id: &str) -> Result<AccountId, ApiError> {
    let followee: AccountId = account_id
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid account id".into()))?;

    if followee == auth.account_id {
        return Err(ApiError::BadRequest("cannot follow yourself".into()));
    }
    Ok(followee)
}
