//! Key-value store trait definition.

use crate::error::StorageResult;
use async_trait::async_trait;

/// A persistent key-value store.
///
/// Stores hold opaque string values under string keys. Callers own the
/// value format (the offline queue and the sync engine both store JSON).
///
/// # Invariants
///
/// - `get` after a successful `set` returns the value that was set
/// - `get` of a key that was never set (or was deleted) returns `None`
/// - `delete` of a missing key succeeds
/// - Stores must be `Send + Sync` so they can be shared behind an `Arc`
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
/// - [`super::EncryptedStore`] - For secrets at rest
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying medium cannot be read. A missing
    /// key is `Ok(None)`, not an error.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the write fails.
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes `key` and its value.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal fails for a reason other than the
    /// key being absent.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Lists every key currently present, in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying medium cannot be enumerated.
    async fn keys(&self) -> StorageResult<Vec<String>>;
}
