//! Error types for rv-storage

use thiserror::Error;

/// Storage operation errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Serializable validation failed; the transaction must be retried (S001)
    #[error("[S001] Transaction conflict: {0}")]
    Conflict(String),

    /// Backend failure (S002)
    #[error("[S002] Storage backend failed: {0}")]
    Backend(String),

    /// Transaction used after commit or abort (S003)
    #[error("[S003] Transaction already finished")]
    TransactionFinished,

    /// Mutex poisoned (S004)
    #[error("[S004] Storage mutex poisoned: {0}")]
    MutexPoisoned(String),
}

/// Result type alias for StorageError
pub type StorageResult<T> = Result<T, StorageError>;

impl From<duckdb::Error> for StorageError {
    fn from(err: duckdb::Error) -> Self {
        // duckdb::Error carries no structured conflict variant
        let msg = err.to_string();
        if msg.contains("Conflict") || msg.contains("conflict") {
            StorageError::Conflict(msg)
        } else {
            StorageError::Backend(msg)
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for StorageError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        StorageError::MutexPoisoned(err.to_string())
    }
}
