//! Store error types.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the vault or the account registry.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A stored secret failed authenticated decryption. The account needs
    /// to be reconnected; retrying cannot help.
    #[error("corrupt secret: {0}")]
    CorruptSecret(String),

    /// Encryption failed.
    #[error("encryption error: {0}")]
    Crypto(String),

    /// Underlying database error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The referenced account does not exist.
    #[error("account not found: {account_id}")]
    AccountNotFound { account_id: String },
}

impl StoreError {
    /// Creates a corrupt-secret error.
    pub fn corrupt_secret(message: impl Into<String>) -> Self {
        Self::CorruptSecret(message.into())
    }

    /// Creates a crypto error.
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto(message.into())
    }

    /// Creates an account-not-found error.
    pub fn account_not_found(account_id: impl Into<String>) -> Self {
        Self::AccountNotFound {
            account_id: account_id.into(),
        }
    }
}
