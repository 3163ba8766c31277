//! Legion HTTP API Service.
//!
//! This crate provides the HTTP API over the legion core, including:
//!
//! - AI generation (debit, submit, complete-or-refund)
//! - Credit balance and transaction history
//! - Cached feeds with explicit invalidation
//! - Optimistic like/unlike with a background drain worker
//! - Payment and identity webhooks
//!
//! # Authentication
//!
//! End-user requests carry a bearer token issued by the identity provider,
//! validated against its JWKS. Webhooks authenticate with HMAC signatures
//! over the raw body instead.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers need async for routing consistency

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod provider;
pub mod routes;
pub mod state;
pub mod worker;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use provider::HttpAiProvider;
pub use routes::create_router;
pub use state::AppState;
pub use worker::spawn_drain_worker;
