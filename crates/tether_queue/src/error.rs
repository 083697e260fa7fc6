//! Error types for the offline queue.

use tether_storage::StorageError;
use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors surfaced by [`crate::OfflineQueue`].
///
/// Persistence failures during normal operation are logged and swallowed;
/// these variants are only returned by the explicit `load` and `flush`
/// calls and by lifecycle misuse.
#[derive(Debug, Error)]
pub enum QueueError {
    /// `initialize` was called more than once.
    #[error("offline queue is already initialized")]
    AlreadyInitialized,

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The persisted queue could not be encoded or decoded.
    #[error("invalid persisted queue: {0}")]
    Serialization(#[from] serde_json::Error),
}
