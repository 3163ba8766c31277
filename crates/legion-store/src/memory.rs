//! In-memory ledger store.
//!
//! A test backend implementing [`LedgerStore`] over a single mutex-guarded
//! map set. Holding one lock per operation gives the same row-level
//! atomicity the PostgreSQL backend gets from conditional updates, so the
//! concurrency properties of the ledger can be exercised without a
//! database.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use legion_core::{
    Account, AccountId, BalanceSnapshot, CreditTransaction, FeedItem, GenerationJob, JobId,
    JobStatus, Post, PostId, TransactionId, TransactionStatus, Visibility,
};

use crate::error::{Result, StoreError};
use crate::ledger::LedgerStore;

#[derive(Default)]
struct Inner {
    accounts: HashMap<AccountId, Account>,
    // Keyed by ULID string so iteration is chronological.
    transactions: BTreeMap<String, CreditTransaction>,
    snapshots: Vec<BalanceSnapshot>,
    jobs: HashMap<JobId, GenerationJob>,
    posts: Vec<Post>,
    likes: HashSet<(AccountId, PostId)>,
    follows: HashSet<(AccountId, AccountId)>,
}

/// In-memory implementation of [`LedgerStore`].
#[derive(Default)]
pub struct MemoryLedgerStore {
    inner: Mutex<Inner>,
}

impl MemoryLedgerStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All recorded snapshots, oldest first. Test inspection helper.
    #[must_use]
    pub fn snapshots(&self) -> Vec<BalanceSnapshot> {
        self.lock().snapshots.clone()
    }

    /// Whether a like row exists. Test inspection helper.
    #[must_use]
    pub fn like_exists(&self, account_id: &AccountId, post_id: &PostId) -> bool {
        self.lock().likes.contains(&(*account_id, *post_id))
    }

    /// Whether a follow edge exists. Test inspection helper.
    #[must_use]
    pub fn follow_exists(&self, follower_id: &AccountId, followee_id: &AccountId) -> bool {
        self.lock().follows.contains(&(*follower_id, *followee_id))
    }

    fn feed_item(inner: &Inner, post: &Post) -> Option<FeedItem> {
        let author = inner.accounts.get(&post.account_id)?;
        let generation = post.generation_id.and_then(|id| inner.jobs.get(&id));
        #[allow(clippy::cast_possible_wrap)]
        let like_count = inner
            .likes
            .iter()
            .filter(|(_, post_id)| *post_id == post.id)
            .count() as i64;

        Some(FeedItem {
            post_id: post.id,
            author_id: post.account_id,
            author_username: author.username.clone(),
            author_avatar_url: author.avatar_url.clone(),
            caption: post.caption.clone(),
            generation_id: post.generation_id,
            generation_kind: generation.map(|job| job.kind),
            result_url: generation.and_then(|job| job.result_url.clone()),
            like_count,
            created_at: post.created_at,
        })
    }

    fn collect_feed<F>(inner: &Inner, limit: usize, mut filter: F) -> Vec<FeedItem>
    where
        F: FnMut(&Post) -> bool,
    {
        let mut posts: Vec<&Post> = inner.posts.iter().filter(|p| filter(p)).collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts
            .into_iter()
            .take(limit)
            .filter_map(|post| Self::feed_item(inner, post))
            .collect()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn insert_account(&self, account: &Account) -> Result<()> {
        self.lock().accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        Ok(self.lock().accounts.get(account_id).cloned())
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        Ok(self
            .lock()
            .accounts
            .values()
            .find(|account| account.email == email)
            .cloned())
    }

    async fn update_account_profile(
        &self,
        account_id: &AccountId,
        username: Option<&str>,
        email: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.lock();
        let account = inner
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            })?;

        if let Some(username) = username {
            account.username = username.to_string();
        }
        if let Some(email) = email {
            account.email = email.to_string();
        }
        if let Some(avatar_url) = avatar_url {
            account.avatar_url = Some(avatar_url.to_string());
        }
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_account(&self, account_id: &AccountId) -> Result<()> {
        let mut inner = self.lock();
        if inner.accounts.remove(account_id).is_none() {
            return Err(StoreError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            });
        }
        Ok(())
    }

    async fn debit_balance(&self, account_id: &AccountId, amount: i64) -> Result<i64> {
        // The whole check-and-mutate happens under one lock, mirroring the
        // single-statement conditional update in the Postgres backend.
        let mut inner = self.lock();
        let account = inner
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            })?;

        if account.balance < amount {
            return Err(StoreError::InsufficientCredits {
                balance: account.balance,
                required: amount,
            });
        }

        account.balance -= amount;
        account.updated_at = Utc::now();
        Ok(account.balance)
    }

    async fn credit_balance(&self, account_id: &AccountId, amount: i64) -> Result<i64> {
        let mut inner = self.lock();
        let account = inner
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            })?;

        account.balance += amount;
        account.updated_at = Utc::now();
        Ok(account.balance)
    }

    async fn insert_transaction(&self, transaction: &CreditTransaction) -> Result<()> {
        self.lock()
            .transactions
            .insert(transaction.id.to_string(), transaction.clone());
        Ok(())
    }

    async fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<CreditTransaction>> {
        Ok(self
            .lock()
            .transactions
            .get(&transaction_id.to_string())
            .cloned())
    }

    async fn set_transaction_status(
        &self,
        transaction_id: &TransactionId,
        status: TransactionStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut inner = self.lock();
        let transaction = inner
            .transactions
            .get_mut(&transaction_id.to_string())
            .ok_or_else(|| StoreError::NotFound {
                entity: "transaction",
                id: transaction_id.to_string(),
            })?;

        transaction.status = status;
        if completed_at.is_some() {
            transaction.completed_at = completed_at;
        }
        Ok(())
    }

    async fn list_transactions(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        Ok(self
            .lock()
            .transactions
            .values()
            .rev()
            .filter(|tx| tx.account_id == *account_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_snapshot(&self, snapshot: &BalanceSnapshot) -> Result<()> {
        self.lock().snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn insert_job(&self, job: &GenerationJob) -> Result<()> {
        self.lock().jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> Result<Option<GenerationJob>> {
        Ok(self.lock().jobs.get(job_id).cloned())
    }

    async fn set_job_result(
        &self,
        job_id: &JobId,
        status: JobStatus,
        result_url: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.lock();
        let job = inner.jobs.get_mut(job_id).ok_or_else(|| StoreError::NotFound {
            entity: "generation job",
            id: job_id.to_string(),
        })?;

        job.status = status;
        job.result_url = result_url.map(String::from);
        Ok(())
    }

    async fn list_jobs(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<GenerationJob>> {
        let mut jobs: Vec<GenerationJob> = self
            .lock()
            .jobs
            .values()
            .filter(|job| job.account_id == *account_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert_post(&self, post: &Post) -> Result<()> {
        self.lock().posts.push(post.clone());
        Ok(())
    }

    async fn insert_like(&self, account_id: &AccountId, post_id: &PostId) -> Result<()> {
        self.lock().likes.insert((*account_id, *post_id));
        Ok(())
    }

    async fn delete_like(&self, account_id: &AccountId, post_id: &PostId) -> Result<()> {
        self.lock().likes.remove(&(*account_id, *post_id));
        Ok(())
    }

    async fn insert_follow(
        &self,
        follower_id: &AccountId,
        followee_id: &AccountId,
    ) -> Result<()> {
        self.lock().follows.insert((*follower_id, *followee_id));
        Ok(())
    }

    async fn delete_follow(
        &self,
        follower_id: &AccountId,
        followee_id: &AccountId,
    ) -> Result<()> {
        self.lock().follows.remove(&(*follower_id, *followee_id));
        Ok(())
    }

    async fn list_home_feed(&self, viewer_id: &AccountId, limit: usize) -> Result<Vec<FeedItem>> {
        let inner = self.lock();
        let followees: HashSet<AccountId> = inner
            .follows
            .iter()
            .filter(|(follower, _)| follower == viewer_id)
            .map(|(_, followee)| *followee)
            .collect();

        Ok(Self::collect_feed(&inner, limit, |post| {
            followees.contains(&post.account_id) && post.visibility != Visibility::Private
        }))
    }

    async fn list_explore_feed(&self, limit: usize) -> Result<Vec<FeedItem>> {
        let inner = self.lock();
        Ok(Self::collect_feed(&inner, limit, |post| {
            post.visibility == Visibility::Public
        }))
    }

    async fn list_profile_feed(
        &self,
        account_id: &AccountId,
        limit: usize,
    ) -> Result<Vec<FeedItem>> {
        let inner = self.lock();
        Ok(Self::collect_feed(&inner, limit, |post| {
            post.account_id == *account_id && post.visibility == Visibility::Public
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_with_balance(balance: i64) -> Account {
        let mut account = Account::new(
            AccountId::generate(),
            "tester".into(),
            "tester@example.com".into(),
        );
        account.balance = balance;
        account
    }

    #[tokio::test]
    async fn debit_is_conditional() {
        let store = MemoryLedgerStore::new();
        let account = account_with_balance(20);
        store.insert_account(&account).await.unwrap();

        assert_eq!(store.debit_balance(&account.id, 15).await.unwrap(), 5);

        let err = store.debit_balance(&account.id, 10).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientCredits {
                balance: 5,
                required: 10
            }
        ));
    }

    #[tokio::test]
    async fn debit_missing_account_is_not_found() {
        let store = MemoryLedgerStore::new();
        let err = store
            .debit_balance(&AccountId::generate(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "account", .. }));
    }

    #[tokio::test]
    async fn duplicate_like_is_a_noop() {
        let store = MemoryLedgerStore::new();
        let account_id = AccountId::generate();
        let post_id = PostId::generate();

        store.insert_like(&account_id, &post_id).await.unwrap();
        store.insert_like(&account_id, &post_id).await.unwrap();
        assert!(store.like_exists(&account_id, &post_id));

        store.delete_like(&account_id, &post_id).await.unwrap();
        // Deleting again is also a no-op.
        store.delete_like(&account_id, &post_id).await.unwrap();
        assert!(!store.like_exists(&account_id, &post_id));
    }

    #[tokio::test]
    async fn home_feed_only_shows_followed_authors() {
        let store = MemoryLedgerStore::new();
        let viewer = account_with_balance(0);
        let followed = account_with_balance(0);
        let stranger = account_with_balance(0);
        store.insert_account(&viewer).await.unwrap();
        store.insert_account(&followed).await.unwrap();
        store.insert_account(&stranger).await.unwrap();
        store.insert_follow(&viewer.id, &followed.id).await.unwrap();

        store
            .insert_post(&Post::new(followed.id, None, Some("hi".into()), Visibility::Public))
            .await
            .unwrap();
        store
            .insert_post(&Post::new(stranger.id, None, None, Visibility::Public))
            .await
            .unwrap();

        let feed = store.list_home_feed(&viewer.id, 50).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].author_id, followed.id);
    }
}
