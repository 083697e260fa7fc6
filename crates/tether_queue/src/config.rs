//! Queue configuration.

/// Default key under which the queue is persisted.
pub const DEFAULT_STORAGE_KEY: &str = "offline_queue";

/// Configuration for [`crate::OfflineQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum number of queued requests.
    pub max_size: usize,
    /// Attempts after which a failing request is dropped.
    pub max_attempts: u32,
    /// Key of the persisted queue in the store.
    pub storage_key: String,
}

impl QueueConfig {
    /// Sets the capacity.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Sets the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the storage key.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            max_attempts: 3,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.max_size, 100);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.storage_key, "offline_queue");

        let config = config.with_max_size(2).with_max_attempts(5).with_storage_key("q");
        assert_eq!((config.max_size, config.max_attempts), (2, 5));
        assert_eq!(config.storage_key, "q");
    }
}
