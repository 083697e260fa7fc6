//! Error types for the sync engine.

use tether_net::NetError;
use tether_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote could not be reached or answered with an error.
    #[error("remote error: {0}")]
    Remote(#[from] NetError),

    /// The remote rejected pushed changes.
    #[error("push rejected: {0}")]
    Rejected(String),

    /// The local store failed.
    #[error("local store error: {0}")]
    Local(String),

    /// Persisted sync metadata could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Persisted sync metadata is malformed.
    #[error("invalid sync metadata: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The remote answered with something other than what was asked.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SyncError {
    /// Creates a local store error.
    pub fn local(message: impl Into<String>) -> Self {
        Self::Local(message.into())
    }

    /// Returns true if a later sync may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote(err) => err.retryable,
            SyncError::Storage(_) => true,
            _ => false,
        }
    }
}
