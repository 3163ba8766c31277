//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{credits, feed, generate, health, posts, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests for generation endpoints. Generations hold
/// a provider call open for a long time, so their pool is kept small.
const GENERATE_MAX_CONCURRENT_REQUESTS: usize = 25;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /v1/feed/explore` - Shared explore feed
/// - `GET /v1/feed/user/:account_id` - An account's public posts
///
/// ## Authenticated (bearer JWT)
/// - `POST /v1/generate` - Run a generation
/// - `GET /v1/generate/history` - Generation history
/// - `GET /v1/generate/:job_id` - Job status
/// - `GET /v1/credits/balance` - Current balance
/// - `GET /v1/credits/transactions` - Transaction history
/// - `GET /v1/feed/home` - Home feed
/// - `POST /v1/posts` - Create a post
/// - `POST|DELETE /v1/posts/:post_id/like` - Optimistic like/unlike
/// - `POST|DELETE /v1/follows/:account_id` - Follow/unfollow
///
/// ## Webhooks (HMAC signature verification)
/// - `POST /webhooks/payment` - Payment processor orders
/// - `POST /webhooks/identity` - Identity lifecycle events
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);
    let state = Arc::new(state);

    // Generation routes get their own, smaller concurrency pool.
    let generate_routes = Router::new()
        .route("/", post(generate::generate))
        .route("/history", get(generate::job_history))
        .route("/:job_id", get(generate::job_status))
        .layer(ConcurrencyLimitLayer::new(GENERATE_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Credits
        .route("/credits/balance", get(credits::get_balance))
        .route("/credits/transactions", get(credits::list_transactions))
        // Feeds
        .route("/feed/home", get(feed::home_feed))
        .route("/feed/explore", get(feed::explore_feed))
        .route("/feed/user/:account_id", get(feed::user_feed))
        // Posts and interactions
        .route("/posts", post(posts::create_post))
        .route("/posts/:post_id/like", post(posts::like_post))
        .route("/posts/:post_id/like", delete(posts::unlike_post))
        .route("/follows/:account_id", post(posts::follow))
        .route("/follows/:account_id", delete(posts::unfollow))
        // Generation routes (with their own concurrency limit)
        .nest("/generate", generate_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no limits)
        .route("/health", get(health::health))
        // API v1 routes
        .nest("/v1", api_routes)
        // Webhooks (no concurrency limit - controlled by external senders)
        .route("/webhooks/payment", post(webhooks::payment_webhook))
        .route("/webhooks/identity", post(webhooks::identity_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
