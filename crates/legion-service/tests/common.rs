//! Common test utilities for legion-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;

use legion_core::{Account, AccountId};
use legion_ledger::{AiProvider, GenerationRequest, GenerationResult, ProviderError};
use legion_service::{create_router, AppState, ServiceConfig};
use legion_store::{CacheStore, LedgerStore, MemoryCache, MemoryLedgerStore};

/// Payment webhook secret used by the harness.
pub const PAYMENT_SECRET: &str = "whsec_test";

/// Identity webhook secret used by the harness.
pub const IDENTITY_SECRET: &str = "idsec_test";

/// A provider scripted to succeed or fail.
pub struct ScriptedProvider {
    fail: bool,
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, ProviderError> {
        if self.fail {
            Err(ProviderError::new("model unavailable"))
        } else {
            Ok(GenerationResult {
                result_url: format!("https://cdn.test/{}.bin", request.kind.as_str()),
            })
        }
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct handle on the in-memory ledger store.
    pub store: Arc<MemoryLedgerStore>,
    /// Direct handle on the in-memory cache store.
    pub cache: Arc<MemoryCache>,
    /// A seeded test account.
    pub account_id: AccountId,
}

impl TestHarness {
    /// Create a harness with a succeeding AI provider and a seeded account
    /// holding 100 credits.
    pub async fn new() -> Self {
        Self::build(false).await
    }

    /// Create a harness whose AI provider always fails.
    pub async fn with_failing_provider() -> Self {
        Self::build(true).await
    }

    async fn build(provider_fails: bool) -> Self {
        let store = Arc::new(MemoryLedgerStore::new());
        let cache = Arc::new(MemoryCache::new());

        let config = ServiceConfig {
            payment_webhook_secret: Some(PAYMENT_SECRET.into()),
            identity_webhook_secret: Some(IDENTITY_SECRET.into()),
            ..ServiceConfig::default()
        };

        let state = AppState::new(
            Arc::clone(&store) as Arc<dyn LedgerStore>,
            Arc::clone(&cache) as Arc<dyn CacheStore>,
            Some(Arc::new(ScriptedProvider {
                fail: provider_fails,
            })),
            config,
        );

        let router: Router = create_router(state);
        let server = TestServer::new(router).expect("Failed to create test server");

        let account_id = AccountId::generate();
        let account = Account::new(account_id, "tester".into(), "tester@example.com".into());
        store.insert_account(&account).await.expect("seed account");

        Self {
            server,
            store,
            cache,
            account_id,
        }
    }

    /// Seed an additional account with the given balance and email.
    pub async fn seed_account(&self, username: &str, email: &str, balance: i64) -> AccountId {
        let mut account = Account::new(AccountId::generate(), username.into(), email.into());
        account.balance = balance;
        let id = account.id;
        self.store.insert_account(&account).await.expect("seed account");
        id
    }

    /// Set the seeded account's balance directly.
    pub async fn set_balance(&self, account_id: &AccountId, balance: i64) {
        let mut account = self
            .store
            .get_account(account_id)
            .await
            .expect("get account")
            .expect("account exists");
        account.balance = balance;
        self.store.insert_account(&account).await.expect("update account");
    }

    /// Authorization header for the seeded account.
    pub fn auth_header(&self) -> String {
        format!("Bearer test-token:{}", self.account_id)
    }

    /// Authorization header for an arbitrary account.
    pub fn auth_header_for(account_id: &AccountId) -> String {
        format!("Bearer test-token:{account_id}")
    }
}
