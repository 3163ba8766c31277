//! Legion Service - HTTP API for the credit ledger and feed cache core.
//!
//! This is the main entry point for the legion service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use legion_ledger::AiProvider;
use legion_service::{
    create_router, spawn_drain_worker, AppState, HttpAiProvider, ServiceConfig,
};
use legion_store::{PgLedgerStore, RedisCache};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,legion=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Legion Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        payment_webhook_configured = %config.payment_webhook_secret.is_some(),
        identity_webhook_configured = %config.identity_webhook_secret.is_some(),
        ai_provider_configured = %config.ai_api_url.is_some(),
        "Service configuration loaded"
    );

    // Connect to PostgreSQL and apply migrations
    tracing::info!("Connecting to PostgreSQL");
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await?;
    let store = PgLedgerStore::new(pool);
    store.migrate().await?;

    // Connect to Redis
    tracing::info!("Connecting to Redis");
    let cache = RedisCache::open(&config.redis_url)?;

    // Build the AI provider client if configured
    let provider: Option<Arc<dyn AiProvider>> = match (&config.ai_api_url, &config.ai_api_key) {
        (Some(url), Some(key)) => {
            let client = HttpAiProvider::new(url.clone(), key.clone())?;
            tracing::info!(provider_url = %url, "AI provider enabled");
            Some(Arc::new(client))
        }
        _ => {
            tracing::warn!("AI provider not configured - generation will be unavailable");
            None
        }
    };

    // Build app state
    let state = AppState::new(
        Arc::new(store),
        Arc::new(cache),
        provider,
        config.clone(),
    );

    // Start the interaction-queue drain worker
    spawn_drain_worker(Arc::new(state.clone()));
    tracing::info!(
        interval_seconds = %config.drain_interval_seconds,
        batch_size = %config.drain_batch_size,
        "Drain worker started"
    );

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
