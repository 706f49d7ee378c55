//! Error types for rv-stream

use rv_storage::StorageError;
use thiserror::Error;

/// Streaming runtime errors
#[derive(Error, Debug)]
pub enum StreamError {
    /// Storage failure; the caller aborts the in-flight transaction (T001)
    #[error("[T001] Trigger storage failed: {0}")]
    Storage(#[from] StorageError),

    /// Stored trigger state could not be decoded (T002)
    #[error("[T002] Corrupt trigger state: {0}")]
    CorruptState(String),

    /// The operation's cancellation token fired (T003)
    #[error("[T003] Trigger operation cancelled")]
    Cancelled,

    /// Grouping key cannot be stored (T004)
    #[error("[T004] Invalid grouping key {key}: {reason}")]
    InvalidKey { key: String, reason: String },
}

/// Result type alias for StreamError
pub type StreamResult<T> = Result<T, StreamError>;

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::CorruptState(err.to_string())
    }
}
