//! Error types for the sync layer.

use contrace_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// `Clone` so one in-flight sync can hand its outcome to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The remote service could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The remote service answered with a non-success status.
    #[error("remote service returned {status}: {message}")]
    Remote { status: u16, message: String },

    /// The remote service did not answer in time.
    #[error("operation timed out")]
    Timeout,

    /// Local storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// No stable user id has been created yet.
    #[error("identity not initialized")]
    IdentityNotInitialized,

    /// A request or response body could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The background sync task did not run to completion.
    #[error("sync task failed: {0}")]
    Task(String),
}

impl SyncError {
    /// Whether trying again later may succeed without local changes.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout => true,
            Self::Remote { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::Storage(_)
            | Self::IdentityNotInitialized
            | Self::Serialization(_)
            | Self::Task(_) => false,
        }
    }
}

impl From<StorageError> for SyncError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
