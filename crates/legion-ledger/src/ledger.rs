//! The credit ledger.
//!
//! The account balance is the single piece of truly shared mutable state
//! in the system. It is only ever mutated through the two atomic
//! operations here; feature code never reads-modifies-writes it.

use std::sync::Arc;

use legion_core::{
    AccountId, BalanceSnapshot, LedgerError, Result, TransactionId,
};
use legion_store::LedgerStore;

/// Enforces balance invariants and records the snapshot audit trail.
///
/// Cheap to clone; handlers hold one per request context.
#[derive(Clone)]
pub struct CreditLedger {
    store: Arc<dyn LedgerStore>,
}

impl CreditLedger {
    /// Create a ledger over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Read-only balance check. Does not lock; a concurrent debit may still
    /// win between this check and a subsequent [`debit`](Self::debit).
    ///
    /// # Errors
    ///
    /// - `LedgerError::Validation` if `amount` is not positive.
    /// - `LedgerError::AccountNotFound` if the account doesn't exist.
    pub async fn has_sufficient_balance(
        &self,
        account_id: &AccountId,
        amount: i64,
    ) -> Result<bool> {
        validate_amount(amount)?;
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound {
                account_id: account_id.to_string(),
            })?;
        Ok(account.has_sufficient_balance(amount))
    }

    /// Current balance for an account.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::AccountNotFound` if the account doesn't exist.
    pub async fn balance(&self, account_id: &AccountId) -> Result<i64> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound {
                account_id: account_id.to_string(),
            })?;
        Ok(account.balance)
    }

    /// Atomically debit `amount` credits. Returns the new balance.
    ///
    /// The check and the mutation are the same conditional statement in the
    /// store; concurrent debits against one account cannot both succeed if
    /// doing so would drive the balance negative.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Validation` if `amount` is not positive.
    /// - `LedgerError::InsufficientCredits` if the conditional update
    ///   affected zero rows. No partial effect.
    /// - `LedgerError::AccountNotFound` if the account doesn't exist.
    pub async fn debit(&self, account_id: &AccountId, amount: i64) -> Result<i64> {
        validate_amount(amount)?;
        let balance = self.store.debit_balance(account_id, amount).await?;
        tracing::debug!(
            account_id = %account_id,
            amount = %amount,
            new_balance = %balance,
            "Debited credits"
        );
        Ok(balance)
    }

    /// Atomically credit `amount` credits. Returns the new balance.
    ///
    /// Used for refunds and purchase fulfillment.
    ///
    /// # Errors
    ///
    /// - `LedgerError::Validation` if `amount` is not positive.
    /// - `LedgerError::AccountNotFound` if the account doesn't exist.
    pub async fn credit(&self, account_id: &AccountId, amount: i64) -> Result<i64> {
        validate_amount(amount)?;
        let balance = self.store.credit_balance(account_id, amount).await?;
        tracing::debug!(
            account_id = %account_id,
            amount = %amount,
            new_balance = %balance,
            "Credited credits"
        );
        Ok(balance)
    }

    /// Append a balance snapshot. Best-effort: a failed write is logged and
    /// never fails the calling operation, so the balance stays strongly
    /// consistent while the snapshot trail is eventually consistent.
    pub async fn record_snapshot(
        &self,
        account_id: &AccountId,
        transaction_id: Option<TransactionId>,
        balance_before: i64,
        balance_after: i64,
        reason: &str,
    ) {
        let snapshot = BalanceSnapshot::new(
            *account_id,
            transaction_id,
            balance_before,
            balance_after,
            reason,
        );
        if let Err(e) = self.store.insert_snapshot(&snapshot).await {
            tracing::error!(
                account_id = %account_id,
                reason = %reason,
                error = %e,
                "Failed to record balance snapshot"
            );
        }
    }
}

fn validate_amount(amount: i64) -> Result<()> {
    if amount <= 0 {
        return Err(LedgerError::Validation(format!(
            "amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use legion_core::Account;
    use legion_store::MemoryLedgerStore;

    async fn store_with_account(balance: i64) -> (Arc<MemoryLedgerStore>, AccountId) {
        let store = Arc::new(MemoryLedgerStore::new());
        let mut account = Account::new(
            AccountId::generate(),
            "tester".into(),
            "tester@example.com".into(),
        );
        account.balance = balance;
        let id = account.id;
        store.insert_account(&account).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn debit_rejects_non_positive_amounts() {
        let (store, id) = store_with_account(100).await;
        let ledger = CreditLedger::new(store);

        assert!(matches!(
            ledger.debit(&id, 0).await.unwrap_err(),
            LedgerError::Validation(_)
        ));
        assert!(matches!(
            ledger.debit(&id, -5).await.unwrap_err(),
            LedgerError::Validation(_)
        ));
        assert_eq!(ledger.balance(&id).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn debit_then_credit_round_trips() {
        let (store, id) = store_with_account(50).await;
        let ledger = CreditLedger::new(store);

        assert_eq!(ledger.debit(&id, 10).await.unwrap(), 40);
        assert_eq!(ledger.credit(&id, 10).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn debit_of_missing_account_reports_not_found() {
        let ledger = CreditLedger::new(Arc::new(MemoryLedgerStore::new()));
        assert!(matches!(
            ledger.debit(&AccountId::generate(), 10).await.unwrap_err(),
            LedgerError::AccountNotFound { .. }
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_debits_never_overdraw() {
        let (store, id) = store_with_account(20).await;
        let ledger = CreditLedger::new(store as Arc<dyn LedgerStore>);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.debit(&id, 10).await }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        // Balance 20 admits exactly two successful 10-credit debits.
        assert_eq!(successes, 2);
        assert_eq!(ledger.balance(&id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sufficient_balance_check_does_not_mutate() {
        let (store, id) = store_with_account(15).await;
        let ledger = CreditLedger::new(store);

        assert!(ledger.has_sufficient_balance(&id, 15).await.unwrap());
        assert!(!ledger.has_sufficient_balance(&id, 16).await.unwrap());
        assert_eq!(ledger.balance(&id).await.unwrap(), 15);
    }

    #[tokio::test]
    async fn snapshot_records_the_change() {
        let (store, id) = store_with_account(30).await;
        let ledger = CreditLedger::new(Arc::clone(&store) as Arc<dyn LedgerStore>);

        ledger.record_snapshot(&id, None, 30, 20, "generation").await;

        let snapshots = store.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].delta, -10);
        assert_eq!(snapshots[0].reason, "generation");
    }
}
