//! A key-value store with injectable failures.

use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use tether_storage::{KeyValueStore, StorageError, StorageResult};

/// Wraps a store and fails reads or writes on demand.
#[derive(Debug, Default)]
pub struct FlakyStore<S> {
    inner: S,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl<S: KeyValueStore> FlakyStore<S> {
    /// Wraps `inner`; nothing fails until asked to.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Makes `get` and `keys` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes `set` and `delete` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(flag: &AtomicBool, what: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::Io(io::Error::other(format!("injected {what} failure"))))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for FlakyStore<S> {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.delete(key).await
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.keys().await
    }
}
