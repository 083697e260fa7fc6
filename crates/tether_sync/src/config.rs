//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Local schema version sent with every pull.
    pub schema_version: u32,
    /// A sync is due once this much time has passed since the last one.
    pub sync_interval: Duration,
    /// Store key of the pull cursor.
    pub cursor_key: String,
    /// Store key of the last successful sync time.
    pub last_sync_key: String,
}

impl SyncConfig {
    /// Creates a configuration for the given schema version.
    pub fn new(schema_version: u32) -> Self {
        Self {
            schema_version,
            sync_interval: Duration::from_secs(5 * 60),
            cursor_key: "sync.last_pulled_at".to_string(),
            last_sync_key: "sync.last_synced_at".to_string(),
        }
    }

    /// Sets the sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the store keys for the cursor and the last sync time.
    pub fn with_keys(mut self, cursor_key: impl Into<String>, last_sync_key: impl Into<String>) -> Self {
        self.cursor_key = cursor_key.into();
        self.last_sync_key = last_sync_key.into();
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(1)
    }
}
