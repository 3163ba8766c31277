//! The relational store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use legion_core::{
    Account, AccountId, BalanceSnapshot, CreditTransaction, FeedItem, GenerationJob, JobId,
    JobStatus, Post, PostId, TransactionId, TransactionStatus,
};

use crate::error::Result;

/// The ledger-store trait defining all relational operations the core needs.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (PostgreSQL in production, in-memory for testing). The
/// single non-negotiable capability is [`debit_balance`]: an atomic
/// conditional update so that concurrent debits can never drive a balance
/// negative.
///
/// [`debit_balance`]: LedgerStore::debit_balance
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Insert a new account record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_account(&self, account: &Account) -> Result<()>;

    /// Get an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>>;

    /// Get an account by its unique email. Used to resolve payment webhooks.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Update the profile fields synced from the identity provider.
    ///
    /// Never touches the balance.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    async fn update_account_profile(
        &self,
        account_id: &AccountId,
        username: Option<&str>,
        email: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<()>;

    /// Delete an account.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    async fn delete_account(&self, account_id: &AccountId) -> Result<()>;

    /// Atomically debit `amount` credits, failing if the balance would go
    /// negative.
    ///
    /// Equivalent to
    /// `UPDATE accounts SET balance = balance - $2 WHERE id = $1 AND balance >= $2
    /// RETURNING balance`; the check and the mutation are one statement.
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the account doesn't exist.
    /// - `StoreError::InsufficientCredits` if the conditional update affected
    ///   zero rows.
    async fn debit_balance(&self, account_id: &AccountId, amount: i64) -> Result<i64>;

    /// Atomically credit `amount` credits. Returns the new balance.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the account doesn't exist.
    async fn credit_balance(&self, account_id: &AccountId, amount: i64) -> Result<i64>;

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    /// Insert a credit transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_transaction(&self, transaction: &CreditTransaction) -> Result<()>;

    /// Get a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<CreditTransaction>>;

    /// Advance a transaction's status, optionally stamping completion time.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the transaction doesn't exist.
    async fn set_transaction_status(
        &self,
        transaction_id: &TransactionId,
        status: TransactionStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// List transactions for an account, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_transactions(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>>;

    // =========================================================================
    // Snapshot Operations
    // =========================================================================

    /// Append a balance snapshot row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails. Callers treat
    /// snapshot writes as best-effort audit.
    async fn insert_snapshot(&self, snapshot: &BalanceSnapshot) -> Result<()>;

    // =========================================================================
    // Generation Job Operations
    // =========================================================================

    /// Insert a generation job.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_job(&self, job: &GenerationJob) -> Result<()>;

    /// Get a job by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_job(&self, job_id: &JobId) -> Result<Option<GenerationJob>>;

    /// Set a job's terminal status and result reference.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the job doesn't exist.
    async fn set_job_result(
        &self,
        job_id: &JobId,
        status: JobStatus,
        result_url: Option<&str>,
    ) -> Result<()>;

    /// List an account's jobs, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_jobs(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<GenerationJob>>;

    // =========================================================================
    // Social Rows (posts, likes, follows)
    // =========================================================================

    /// Insert a post.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_post(&self, post: &Post) -> Result<()>;

    /// Insert a like row. A duplicate `(account, post)` pair is a no-op,
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_like(&self, account_id: &AccountId, post_id: &PostId) -> Result<()>;

    /// Delete a like row. Absence is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn delete_like(&self, account_id: &AccountId, post_id: &PostId) -> Result<()>;

    /// Insert a follow edge. A duplicate pair is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_follow(&self, follower_id: &AccountId, followee_id: &AccountId) -> Result<()>;

    /// Delete a follow edge. Absence is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn delete_follow(&self, follower_id: &AccountId, followee_id: &AccountId) -> Result<()>;

    // =========================================================================
    // Feed Recompute Queries
    // =========================================================================

    /// Posts from accounts the viewer follows, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_home_feed(&self, viewer_id: &AccountId, limit: usize) -> Result<Vec<FeedItem>>;

    /// Recent public posts across the platform, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_explore_feed(&self, limit: usize) -> Result<Vec<FeedItem>>;

    /// An account's own posts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_profile_feed(&self, account_id: &AccountId, limit: usize)
        -> Result<Vec<FeedItem>>;
}
