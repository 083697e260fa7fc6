//! Persisted sync cursor and schedule.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use std::time::Duration;
use tether_protocol::Timestamp;
use tether_storage::KeyValueStore;

/// The sync state that survives restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncMetadata {
    /// Server time up to which remote changes were applied.
    pub last_pulled_at: Option<Timestamp>,
    /// Local time of the last successful sync.
    pub last_synced_at: Option<Timestamp>,
}

impl SyncMetadata {
    /// Reads the metadata from `store`.
    pub async fn load(store: &dyn KeyValueStore, config: &SyncConfig) -> SyncResult<Self> {
        Ok(Self {
            last_pulled_at: read_timestamp(store, &config.cursor_key).await?,
            last_synced_at: read_timestamp(store, &config.last_sync_key).await?,
        })
    }

    /// Writes the metadata to `store`. Absent values are deleted.
    pub async fn save(&self, store: &dyn KeyValueStore, config: &SyncConfig) -> SyncResult<()> {
        write_timestamp(store, &config.cursor_key, self.last_pulled_at).await?;
        write_timestamp(store, &config.last_sync_key, self.last_synced_at).await
    }

    /// Returns true if no sync happened yet or more than `interval` has
    /// passed since the last one.
    pub fn is_due(&self, now: Timestamp, interval: Duration) -> bool {
        match self.last_synced_at {
            Some(last) => now.duration_since(last) > interval,
            None => true,
        }
    }
}

async fn read_timestamp(store: &dyn KeyValueStore, key: &str) -> SyncResult<Option<Timestamp>> {
    match store.get(key).await? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

async fn write_timestamp(
    store: &dyn KeyValueStore,
    key: &str,
    value: Option<Timestamp>,
) -> SyncResult<()> {
    match value {
        Some(ts) => store.set(key, &serde_json::to_string(&ts)?).await?,
        None => store.delete(key).await?,
    }
    Ok(())
}
