//! Error types for legion storage.

/// Result type for ledger-store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in ledger-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The entity type.
        entity: &'static str,
        /// The identifier that was not found.
        id: String,
    },

    /// Conditional debit affected zero rows.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },
}

/// Errors that can occur in cache-store operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Cache backend operation failed.
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for legion_core::LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity: "account", id } => {
                Self::AccountNotFound { account_id: id }
            }
            StoreError::NotFound { entity: "transaction", id } => {
                Self::TransactionNotFound { transaction_id: id }
            }
            StoreError::NotFound { entity: "generation job", id } => {
                Self::JobNotFound { job_id: id }
            }
            StoreError::NotFound { entity, id } => {
                Self::Storage(format!("{entity} not found: {id}"))
            }
            StoreError::InsufficientCredits { balance, required } => {
                Self::InsufficientCredits { balance, required }
            }
            StoreError::Database(msg) => Self::Storage(msg),
            StoreError::Serialization(msg) => Self::Serialization(msg),
        }
    }
}

impl From<CacheError> for legion_core::LedgerError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Backend(msg) => Self::Cache(msg),
        }
    }
}
