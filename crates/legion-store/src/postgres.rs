//! PostgreSQL storage implementation.
//!
//! This module provides the `PgLedgerStore` implementation of the
//! [`LedgerStore`] trait. The balance debit is a single conditional
//! `UPDATE ... WHERE balance >= $n RETURNING balance` so that the check and
//! the mutation happen in one statement; there is no read-then-write window.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use legion_core::{
    Account, AccountId, BalanceSnapshot, CreditTransaction, FeedItem, GenerationJob,
    GenerationKind, JobId, JobStatus, Post, PostId, TransactionId, TransactionStatus,
};

use crate::error::{Result, StoreError};
use crate::ledger::LedgerStore;

/// PostgreSQL-backed ledger store.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if a migration fails to apply.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

fn account_from_row(row: &PgRow) -> Result<Account> {
    Ok(Account {
        id: AccountId::from_uuid(row.try_get("id").map_err(db_err)?),
        username: row.try_get("username").map_err(db_err)?,
        email: row.try_get("email").map_err(db_err)?,
        avatar_url: row.try_get("avatar_url").map_err(db_err)?,
        bio: row.try_get("bio").map_err(db_err)?,
        balance: row.try_get("balance").map_err(db_err)?,
        premium: row.try_get("premium").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        updated_at: row.try_get("updated_at").map_err(db_err)?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<CreditTransaction> {
    let id: String = row.try_get("id").map_err(db_err)?;
    let status: String = row.try_get("status").map_err(db_err)?;
    Ok(CreditTransaction {
        id: id
            .parse()
            .map_err(|_| StoreError::Serialization(format!("invalid transaction id: {id}")))?,
        account_id: AccountId::from_uuid(row.try_get("account_id").map_err(db_err)?),
        credits_delta: row.try_get("credits_delta").map_err(db_err)?,
        amount_paid: row.try_get("amount_paid").map_err(db_err)?,
        currency: row.try_get("currency").map_err(db_err)?,
        order_id: row.try_get("order_id").map_err(db_err)?,
        session_id: row.try_get("session_id").map_err(db_err)?,
        idempotency_key: row.try_get("idempotency_key").map_err(db_err)?,
        status: TransactionStatus::parse(&status)
            .ok_or_else(|| StoreError::Serialization(format!("invalid status: {status}")))?,
        metadata: row.try_get("metadata").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
        completed_at: row.try_get("completed_at").map_err(db_err)?,
    })
}

fn job_from_row(row: &PgRow) -> Result<GenerationJob> {
    let kind: String = row.try_get("kind").map_err(db_err)?;
    let status: String = row.try_get("status").map_err(db_err)?;
    Ok(GenerationJob {
        id: JobId::from_uuid(row.try_get("id").map_err(db_err)?),
        account_id: AccountId::from_uuid(row.try_get("account_id").map_err(db_err)?),
        prompt: row.try_get("prompt").map_err(db_err)?,
        kind: GenerationKind::parse(&kind)
            .ok_or_else(|| StoreError::Serialization(format!("invalid kind: {kind}")))?,
        credits_cost: row.try_get("credits_cost").map_err(db_err)?,
        status: JobStatus::parse(&status)
            .ok_or_else(|| StoreError::Serialization(format!("invalid status: {status}")))?,
        result_url: row.try_get("result_url").map_err(db_err)?,
        is_public: row.try_get("is_public").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

fn feed_item_from_row(row: &PgRow) -> Result<FeedItem> {
    let generation_id: Option<uuid::Uuid> = row.try_get("generation_id").map_err(db_err)?;
    let generation_kind: Option<String> = row.try_get("generation_kind").map_err(db_err)?;
    Ok(FeedItem {
        post_id: PostId::from_uuid(row.try_get("post_id").map_err(db_err)?),
        author_id: AccountId::from_uuid(row.try_get("author_id").map_err(db_err)?),
        author_username: row.try_get("author_username").map_err(db_err)?,
        author_avatar_url: row.try_get("author_avatar_url").map_err(db_err)?,
        caption: row.try_get("caption").map_err(db_err)?,
        generation_id: generation_id.map(JobId::from_uuid),
        generation_kind: generation_kind.as_deref().and_then(GenerationKind::parse),
        result_url: row.try_get("result_url").map_err(db_err)?,
        like_count: row.try_get("like_count").map_err(db_err)?,
        created_at: row.try_get("created_at").map_err(db_err)?,
    })
}

const FEED_SELECT: &str = r"
    SELECT p.id AS post_id,
           p.account_id AS author_id,
           a.username AS author_username,
           a.avatar_url AS author_avatar_url,
           p.caption,
           g.id AS generation_id,
           g.kind AS generation_kind,
           g.result_url,
           (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count,
           p.created_at
    FROM posts p
    JOIN accounts a ON a.id = p.account_id
    LEFT JOIN generation_jobs g ON g.id = p.generation_id
";

#[allow(clippy::cast_possible_wrap)]
const fn as_i64(value: usize) -> i64 {
    value as i64
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    async fn insert_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            "INSERT INTO accounts
                 (id, username, email, avatar_url, bio, balance, premium, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(*account.id.as_uuid())
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.avatar_url)
        .bind(&account.bio)
        .bind(account.balance)
        .bind(account.premium)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        sqlx::query("SELECT * FROM accounts WHERE id = $1")
            .bind(*account_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(|row| account_from_row(&row))
            .transpose()
    }

    async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        sqlx::query("SELECT * FROM accounts WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(|row| account_from_row(&row))
            .transpose()
    }

    async fn update_account_profile(
        &self,
        account_id: &AccountId,
        username: Option<&str>,
        email: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE accounts
             SET username = COALESCE($2, username),
                 email = COALESCE($3, email),
                 avatar_url = COALESCE($4, avatar_url),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(*account_id.as_uuid())
        .bind(username)
        .bind(email)
        .bind(avatar_url)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_account(&self, account_id: &AccountId) -> Result<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(*account_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            });
        }
        Ok(())
    }

    async fn debit_balance(&self, account_id: &AccountId, amount: i64) -> Result<i64> {
        // The conditional update is the race-safety mechanism: two concurrent
        // debits cannot both pass the balance check because Postgres resolves
        // the row-level conflict one statement at a time.
        let row = sqlx::query(
            "UPDATE accounts
             SET balance = balance - $2, updated_at = NOW()
             WHERE id = $1 AND balance >= $2
             RETURNING balance",
        )
        .bind(*account_id.as_uuid())
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        if let Some(row) = row {
            return row.try_get("balance").map_err(db_err);
        }

        // Zero rows: either the account is missing or the balance is too low.
        let balance: Option<i64> = sqlx::query("SELECT balance FROM accounts WHERE id = $1")
            .bind(*account_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(|r| r.try_get("balance"))
            .transpose()
            .map_err(db_err)?;

        match balance {
            Some(balance) => Err(StoreError::InsufficientCredits {
                balance,
                required: amount,
            }),
            None => Err(StoreError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            }),
        }
    }

    async fn credit_balance(&self, account_id: &AccountId, amount: i64) -> Result<i64> {
        let row = sqlx::query(
            "UPDATE accounts
             SET balance = balance + $2, updated_at = NOW()
             WHERE id = $1
             RETURNING balance",
        )
        .bind(*account_id.as_uuid())
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map_or_else(
            || {
                Err(StoreError::NotFound {
                    entity: "account",
                    id: account_id.to_string(),
                })
            },
            |row| row.try_get("balance").map_err(db_err),
        )
    }

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    async fn insert_transaction(&self, transaction: &CreditTransaction) -> Result<()> {
        sqlx::query(
            "INSERT INTO credit_transactions
                 (id, account_id, credits_delta, amount_paid, currency,
                  order_id, session_id, idempotency_key, status, metadata,
                  created_at, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(transaction.id.to_string())
        .bind(*transaction.account_id.as_uuid())
        .bind(transaction.credits_delta)
        .bind(transaction.amount_paid)
        .bind(&transaction.currency)
        .bind(&transaction.order_id)
        .bind(&transaction.session_id)
        .bind(&transaction.idempotency_key)
        .bind(transaction.status.as_str())
        .bind(&transaction.metadata)
        .bind(transaction.created_at)
        .bind(transaction.completed_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<CreditTransaction>> {
        sqlx::query("SELECT * FROM credit_transactions WHERE id = $1")
            .bind(transaction_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(|row| transaction_from_row(&row))
            .transpose()
    }

    async fn set_transaction_status(
        &self,
        transaction_id: &TransactionId,
        status: TransactionStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE credit_transactions
             SET status = $2, completed_at = COALESCE($3, completed_at)
             WHERE id = $1",
        )
        .bind(transaction_id.to_string())
        .bind(status.as_str())
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "transaction",
                id: transaction_id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_transactions(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let rows = sqlx::query(
            "SELECT * FROM credit_transactions
             WHERE account_id = $1
             ORDER BY id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(*account_id.as_uuid())
        .bind(as_i64(limit))
        .bind(as_i64(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(transaction_from_row).collect()
    }

    // =========================================================================
    // Snapshot Operations
    // =========================================================================

    async fn insert_snapshot(&self, snapshot: &BalanceSnapshot) -> Result<()> {
        sqlx::query(
            "INSERT INTO balance_snapshots
                 (id, account_id, transaction_id, balance_before, balance_after,
                  delta, reason, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(*snapshot.id.as_uuid())
        .bind(*snapshot.account_id.as_uuid())
        .bind(snapshot.transaction_id.map(|id| id.to_string()))
        .bind(snapshot.balance_before)
        .bind(snapshot.balance_after)
        .bind(snapshot.delta)
        .bind(&snapshot.reason)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    // =========================================================================
    // Generation Job Operations
    // =========================================================================

    async fn insert_job(&self, job: &GenerationJob) -> Result<()> {
        sqlx::query(
            "INSERT INTO generation_jobs
                 (id, account_id, prompt, kind, credits_cost, status,
                  result_url, is_public, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(*job.id.as_uuid())
        .bind(*job.account_id.as_uuid())
        .bind(&job.prompt)
        .bind(job.kind.as_str())
        .bind(job.credits_cost)
        .bind(job.status.as_str())
        .bind(&job.result_url)
        .bind(job.is_public)
        .bind(job.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> Result<Option<GenerationJob>> {
        sqlx::query("SELECT * FROM generation_jobs WHERE id = $1")
            .bind(*job_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .map(|row| job_from_row(&row))
            .transpose()
    }

    async fn set_job_result(
        &self,
        job_id: &JobId,
        status: JobStatus,
        result_url: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE generation_jobs SET status = $2, result_url = $3 WHERE id = $1",
        )
        .bind(*job_id.as_uuid())
        .bind(status.as_str())
        .bind(result_url)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "generation job",
                id: job_id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_jobs(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<GenerationJob>> {
        let rows = sqlx::query(
            "SELECT * FROM generation_jobs
             WHERE account_id = $1
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(*account_id.as_uuid())
        .bind(as_i64(limit))
        .bind(as_i64(offset))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(job_from_row).collect()
    }

    // =========================================================================
    // Social Rows
    // =========================================================================

    async fn insert_post(&self, post: &Post) -> Result<()> {
        sqlx::query(
            "INSERT INTO posts (id, account_id, generation_id, caption, visibility, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(*post.id.as_uuid())
        .bind(*post.account_id.as_uuid())
        .bind(post.generation_id.map(|id| *id.as_uuid()))
        .bind(&post.caption)
        .bind(post.visibility.as_str())
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn insert_like(&self, account_id: &AccountId, post_id: &PostId) -> Result<()> {
        sqlx::query(
            "INSERT INTO likes (id, account_id, post_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (account_id, post_id) DO NOTHING",
        )
        .bind(uuid::Uuid::new_v4())
        .bind(*account_id.as_uuid())
        .bind(*post_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn delete_like(&self, account_id: &AccountId, post_id: &PostId) -> Result<()> {
        sqlx::query("DELETE FROM likes WHERE account_id = $1 AND post_id = $2")
            .bind(*account_id.as_uuid())
            .bind(*post_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    async fn insert_follow(
        &self,
        follower_id: &AccountId,
        followee_id: &AccountId,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO follows (id, follower_id, followee_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (follower_id, followee_id) DO NOTHING",
        )
        .bind(uuid::Uuid::new_v4())
        .bind(*follower_id.as_uuid())
        .bind(*followee_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn delete_follow(
        &self,
        follower_id: &AccountId,
        followee_id: &AccountId,
    ) -> Result<()> {
        sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(*follower_id.as_uuid())
            .bind(*followee_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    // =========================================================================
    // Feed Recompute Queries
    // =========================================================================

    async fn list_home_feed(&self, viewer_id: &AccountId, limit: usize) -> Result<Vec<FeedItem>> {
        let sql = format!(
            "{FEED_SELECT}
             WHERE p.account_id IN
                 (SELECT followee_id FROM follows WHERE follower_id = $1)
               AND p.visibility <> 'private'
             ORDER BY p.created_at DESC
             LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(*viewer_id.as_uuid())
            .bind(as_i64(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(feed_item_from_row).collect()
    }

    async fn list_explore_feed(&self, limit: usize) -> Result<Vec<FeedItem>> {
        let sql = format!(
            "{FEED_SELECT}
             WHERE p.visibility = 'public'
             ORDER BY p.created_at DESC
             LIMIT $1"
        );
        let rows = sqlx::query(&sql)
            .bind(as_i64(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(feed_item_from_row).collect()
    }

    async fn list_profile_feed(
        &self,
        account_id: &AccountId,
        limit: usize,
    ) -> Result<Vec<FeedItem>> {
        let sql = format!(
            "{FEED_SELECT}
             WHERE p.account_id = $1 AND p.visibility = 'public'
             ORDER BY p.created_at DESC
             LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(*account_id.as_uuid())
            .bind(as_i64(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(feed_item_from_row).collect()
    }
}
