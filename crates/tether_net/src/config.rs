//! Configuration for the network layer.

use crate::error::NetError;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A caller-supplied retry decision that replaces the default one.
pub type RetryPredicate = Arc<dyn Fn(&NetError) -> bool + Send + Sync>;

/// Configuration for retry behavior.
#[derive(Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `base_delay * 2^n` plus jitter.
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to each delay.
    pub max_jitter: Duration,
    /// HTTP statuses that are retried when a response was received.
    pub retryable_statuses: BTreeSet<u16>,
    /// Overrides the default retry decision entirely when set.
    pub should_retry: Option<RetryPredicate>,
}

impl RetryConfig {
    /// Creates a configuration with the given retry budget.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(1000),
            retryable_statuses: [408, 429, 500, 502, 503, 504].into_iter().collect(),
            should_retry: None,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self::new(0)
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the jitter bound. Zero disables jitter.
    pub fn with_max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    /// Replaces the retryable status set.
    pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_statuses = statuses.into_iter().collect();
        self
    }

    /// Installs a predicate that decides retryability instead of the
    /// default rules.
    pub fn with_should_retry<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&NetError) -> bool + Send + Sync + 'static,
    {
        self.should_retry = Some(Arc::new(predicate));
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_jitter", &self.max_jitter)
            .field("retryable_statuses", &self.retryable_statuses)
            .field("should_retry", &self.should_retry.as_ref().map(|_| "<predicate>"))
            .finish()
    }
}

/// Configuration for the sliding-window rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests admitted per window.
    pub max_requests: usize,
    /// Window length.
    pub window: Duration,
}

impl RateLimitConfig {
    /// Creates a rate limit of `max_requests` per `window`.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(100, Duration::from_millis(60_000))
    }
}

/// Configuration for request deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupConfig {
    /// How long a settled result keeps being shared.
    pub settle_window: Duration,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            settle_window: Duration::from_secs(5),
        }
    }
}
