//! Error types for legion.

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in legion core operations.
///
/// Every operation reports its failure as one of these tagged kinds; call
/// sites branch on the variant, never on message text.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Malformed input, rejected before any store mutation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Debit's conditional update affected zero rows.
    #[error("insufficient credits: balance={balance}, required={required}")]
    InsufficientCredits {
        /// Current balance.
        balance: i64,
        /// Required amount.
        required: i64,
    },

    /// Account not found.
    #[error("account not found: {account_id}")]
    AccountNotFound {
        /// The account ID that was not found.
        account_id: String,
    },

    /// Transaction not found.
    #[error("transaction not found: {transaction_id}")]
    TransactionNotFound {
        /// The transaction ID that was not found.
        transaction_id: String,
    },

    /// Generation job not found.
    #[error("generation job not found: {job_id}")]
    JobNotFound {
        /// The job ID that was not found.
        job_id: String,
    },

    /// Webhook signature missing or invalid. Fails closed, no state change.
    #[error("invalid webhook signature")]
    SignatureInvalid,

    /// The external provider call failed or timed out.
    #[error("provider error: {message}")]
    Provider {
        /// Provider error message.
        message: String,
    },

    /// A compensating refund itself failed, leaving ledger and job state
    /// divergent. Surfaced loudly; this is the class that pages an operator.
    #[error(
        "refund of {amount} credits failed for account {account_id} (job {job_id}): {message}"
    )]
    RefundFailed {
        /// The account owed the refund.
        account_id: String,
        /// The failed job.
        job_id: String,
        /// Credits owed.
        amount: i64,
        /// Underlying error message.
        message: String,
    },

    /// Ledger store error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Cache store error.
    #[error("cache error: {0}")]
    Cache(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}
