//! Generation job orchestration.
//!
//! The debit-before-call ordering is deliberate: it guarantees an account
//! can never have more concurrent in-flight generations than its balance
//! allows, at the cost of needing a refund path on failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use legion_core::{
    AccountId, GenerationJob, GenerationKind, JobStatus, LedgerError, Result,
};
use legion_store::LedgerStore;

use crate::ledger::CreditLedger;

/// A generation request handed to the external provider.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    /// The prompt to generate from.
    pub prompt: String,

    /// What kind of content to generate.
    pub kind: GenerationKind,

    /// Optional style hint.
    pub style: Option<String>,
}

/// A successful provider response.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResult {
    /// Reference to the generated content.
    pub result_url: String,
}

/// Provider-side failure.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    /// Provider error message.
    pub message: String,
}

impl ProviderError {
    /// Create an error from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The opaque AI provider seam.
///
/// Given a prompt and parameters, returns success with a result reference
/// or failure with a message. No retry logic lives behind this trait; the
/// orchestration imposes a bounded timeout and treats expiry as failure.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Run one generation.
    ///
    /// # Errors
    ///
    /// Returns a `ProviderError` on any provider-side failure.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GenerationResult, ProviderError>;
}

/// Outcome of a completed generation.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// The completed job, with its result reference attached.
    pub job: GenerationJob,

    /// Balance remaining after the debit.
    pub balance_remaining: i64,
}

/// Orchestrates the debit → submit → complete-or-refund flow.
#[derive(Clone)]
pub struct GenerationService {
    store: Arc<dyn LedgerStore>,
    ledger: CreditLedger,
    provider: Arc<dyn AiProvider>,
    provider_timeout: Duration,
}

impl GenerationService {
    /// Create a service over the given store and provider.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        provider: Arc<dyn AiProvider>,
        provider_timeout: Duration,
    ) -> Self {
        let ledger = CreditLedger::new(Arc::clone(&store));
        Self {
            store,
            ledger,
            provider,
            provider_timeout,
        }
    }

    /// Run one generation end to end.
    ///
    /// 1. Reject if the balance cannot cover the kind's cost.
    /// 2. Debit atomically and snapshot.
    /// 3. Create the job row in `processing`.
    /// 4. Invoke the provider under the configured timeout.
    /// 5. On success, mark the job completed and attach the result. On
    ///    provider failure, or any error in steps 3-5, mark the job failed
    ///    and issue a compensating credit for the same amount.
    ///
    /// # Errors
    ///
    /// - `LedgerError::InsufficientCredits` before any mutation.
    /// - `LedgerError::Provider` when the provider failed and the refund
    ///   landed (balance is back where it started).
    /// - `LedgerError::RefundFailed` when the compensating credit itself
    ///   failed: ledger and job state now disagree, which is surfaced
    ///   loudly rather than swallowed.
    pub async fn generate(
        &self,
        account_id: &AccountId,
        prompt: String,
        kind: GenerationKind,
        style: Option<String>,
        is_public: bool,
    ) -> Result<GenerationOutcome> {
        let cost = kind.credit_cost();

        if !self.ledger.has_sufficient_balance(account_id, cost).await? {
            let balance = self.ledger.balance(account_id).await?;
            return Err(LedgerError::InsufficientCredits {
                balance,
                required: cost,
            });
        }

        let balance_after = self.ledger.debit(account_id, cost).await?;
        self.ledger
            .record_snapshot(
                account_id,
                None,
                balance_after + cost,
                balance_after,
                "generation",
            )
            .await;

        let job = GenerationJob::new(*account_id, prompt, kind, is_public);

        if let Err(e) = self.store.insert_job(&job).await {
            self.refund(account_id, &job, cost).await?;
            return Err(e.into());
        }

        let request = GenerationRequest {
            prompt: job.prompt.clone(),
            kind,
            style,
        };

        let provider_result =
            match tokio::time::timeout(self.provider_timeout, self.provider.generate(&request))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::new(format!(
                    "provider call exceeded {}s timeout",
                    self.provider_timeout.as_secs()
                ))),
            };

        match provider_result {
            Ok(result) => {
                if let Err(e) = self
                    .store
                    .set_job_result(&job.id, JobStatus::Completed, Some(&result.result_url))
                    .await
                {
                    // The result cannot be attached, so the job is treated
                    // like any other step 3-5 failure: failed plus refund.
                    tracing::error!(job_id = %job.id, error = %e, "Failed to complete job");
                    if let Err(mark_err) = self
                        .store
                        .set_job_result(&job.id, JobStatus::Failed, None)
                        .await
                    {
                        tracing::error!(job_id = %job.id, error = %mark_err, "Failed to mark job failed");
                    }
                    self.refund(account_id, &job, cost).await?;
                    return Err(e.into());
                }

                tracing::info!(
                    account_id = %account_id,
                    job_id = %job.id,
                    kind = %kind.as_str(),
                    cost = %cost,
                    "Generation completed"
                );

                let mut job = job;
                job.status = JobStatus::Completed;
                job.result_url = Some(result.result_url);

                Ok(GenerationOutcome {
                    job,
                    balance_remaining: balance_after,
                })
            }
            Err(provider_err) => {
                tracing::warn!(
                    account_id = %account_id,
                    job_id = %job.id,
                    error = %provider_err,
                    "Generation failed, refunding"
                );

                if let Err(e) = self
                    .store
                    .set_job_result(&job.id, JobStatus::Failed, None)
                    .await
                {
                    // The refund still has to happen; the job row is repaired
                    // by reconciliation later.
                    tracing::error!(job_id = %job.id, error = %e, "Failed to mark job failed");
                }

                self.refund(account_id, &job, cost).await?;

                Err(LedgerError::Provider {
                    message: provider_err.message,
                })
            }
        }
    }

    /// Issue the compensating credit for a failed job.
    async fn refund(&self, account_id: &AccountId, job: &GenerationJob, cost: i64) -> Result<()> {
        match self.ledger.credit(account_id, cost).await {
            Ok(balance_after) => {
                self.ledger
                    .record_snapshot(
                        account_id,
                        None,
                        balance_after - cost,
                        balance_after,
                        "generation refund",
                    )
                    .await;
                Ok(())
            }
            Err(e) => {
                // Balance and job state now diverge. This is the one error
                // class that must page an operator.
                tracing::error!(
                    account_id = %account_id,
                    job_id = %job.id,
                    amount = %cost,
                    error = %e,
                    "Refund failed after generation failure"
                );
                Err(LedgerError::RefundFailed {
                    account_id: account_id.to_string(),
                    job_id: job.id.to_string(),
                    amount: cost,
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use legion_core::Account;
    use legion_store::MemoryLedgerStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        fail: bool,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn succeeding() -> Self {
            Self {
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AiProvider for ScriptedProvider {
        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> std::result::Result<GenerationResult, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ProviderError::new("model unavailable"))
            } else {
                Ok(GenerationResult {
                    result_url: format!("https://cdn.example.com/{}.png", request.kind.as_str()),
                })
            }
        }
    }

    async fn setup(
        balance: i64,
        provider: ScriptedProvider,
    ) -> (Arc<MemoryLedgerStore>, GenerationService, AccountId) {
        let store = Arc::new(MemoryLedgerStore::new());
        let mut account = Account::new(
            AccountId::generate(),
            "tester".into(),
            "tester@example.com".into(),
        );
        account.balance = balance;
        let id = account.id;
        store.insert_account(&account).await.unwrap();

        let service = GenerationService::new(
            Arc::clone(&store) as Arc<dyn LedgerStore>,
            Arc::new(provider),
            Duration::from_secs(5),
        );
        (store, service, id)
    }

    #[tokio::test]
    async fn successful_generation_debits_and_completes() {
        let (store, service, account_id) = setup(50, ScriptedProvider::succeeding()).await;

        let outcome = service
            .generate(&account_id, "a cat".into(), GenerationKind::Image, None, true)
            .await
            .unwrap();

        assert_eq!(outcome.balance_remaining, 40);
        assert_eq!(outcome.job.status, JobStatus::Completed);
        assert!(outcome.job.result_url.is_some());

        let stored = store.get_job(&outcome.job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn failed_generation_refunds_the_debit() {
        let (store, service, account_id) = setup(50, ScriptedProvider::failing()).await;

        let err = service
            .generate(&account_id, "a cat".into(), GenerationKind::Image, None, true)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Provider { .. }));

        // Debit then refund nets to zero.
        let account = store.get_account(&account_id).await.unwrap().unwrap();
        assert_eq!(account.balance, 50);

        // The one job that was created is failed.
        let jobs = store.list_jobs(&account_id, 10, 0).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Failed);

        // Both sides of the round trip were snapshotted.
        let reasons: Vec<String> = store.snapshots().iter().map(|s| s.reason.clone()).collect();
        assert_eq!(reasons, vec!["generation", "generation refund"]);
    }

    #[tokio::test]
    async fn insufficient_balance_rejects_before_any_mutation() {
        let (store, service, account_id) = setup(4, ScriptedProvider::succeeding()).await;

        let err = service
            .generate(&account_id, "a story".into(), GenerationKind::Text, None, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientCredits {
                balance: 4,
                required: 5
            }
        ));

        let account = store.get_account(&account_id).await.unwrap().unwrap();
        assert_eq!(account.balance, 4);
        assert!(store.list_jobs(&account_id, 10, 0).await.unwrap().is_empty());
        assert!(store.snapshots().is_empty());
    }

    #[tokio::test]
    async fn video_costs_more_than_text() {
        let (_, service, account_id) = setup(55, ScriptedProvider::succeeding()).await;

        let outcome = service
            .generate(&account_id, "a wave".into(), GenerationKind::Video, None, false)
            .await
            .unwrap();
        assert_eq!(outcome.balance_remaining, 5);

        let err = service
            .generate(&account_id, "a wave".into(), GenerationKind::Video, None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientCredits { .. }));
    }
}
