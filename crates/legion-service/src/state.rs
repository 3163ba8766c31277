//! Application state.

use std::sync::Arc;
use std::time::Duration;

use legion_ledger::{
    AiProvider, CreditLedger, FeedCacheManager, GenerationService, IdentityConsumer,
    InteractionQueue, PaymentReconciler,
};
use legion_store::{CacheStore, LedgerStore};

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The relational ledger store.
    pub store: Arc<dyn LedgerStore>,

    /// The key-value cache store.
    pub cache: Arc<dyn CacheStore>,

    /// The credit ledger.
    pub ledger: CreditLedger,

    /// Generation orchestration, when an AI provider is configured.
    pub generation: Option<GenerationService>,

    /// Payment webhook reconciler.
    pub payments: PaymentReconciler,

    /// Identity event consumer.
    pub identity: IdentityConsumer,

    /// Feed cache manager.
    pub feed: FeedCacheManager,

    /// Optimistic like/unlike queue.
    pub likes: InteractionQueue,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Assemble the application state from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        cache: Arc<dyn CacheStore>,
        provider: Option<Arc<dyn AiProvider>>,
        config: ServiceConfig,
    ) -> Self {
        let ledger = CreditLedger::new(Arc::clone(&store));

        let generation = provider.map(|provider| {
            GenerationService::new(
                Arc::clone(&store),
                provider,
                Duration::from_secs(config.provider_timeout_seconds),
            )
        });
        if generation.is_none() {
            tracing::warn!("AI provider not configured - generation endpoints disabled");
        }

        let payments = PaymentReconciler::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            config.payment_webhook_secret.clone(),
        );
        let identity = IdentityConsumer::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            config.identity_webhook_secret.clone(),
        );
        let feed = FeedCacheManager::new(Arc::clone(&cache));
        let likes = InteractionQueue::new(Arc::clone(&cache));

        Self {
            store,
            cache,
            ledger,
            generation,
            payments,
            identity,
            feed,
            likes,
            config,
        }
    }
}
