//! Error classification and retry decisions.

use crate::config::RetryConfig;
use crate::error::{ErrorKind, NetError, TransportError};
use rand::Rng;
use std::time::Duration;

/// Wait used for a 429 without a usable `Retry-After` header, in seconds.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Classifies a transport failure.
///
/// The mapping is a pure function of the variant (first match wins):
///
/// | Input | Kind | Retryable |
/// |---|---|---|
/// | `Timeout` | `TIMEOUT` | yes |
/// | `Network` | `NETWORK_ERROR` | yes |
/// | status 429 | `RATE_LIMITED` (with `retry_after`) | yes |
/// | status >= 500 | `SERVER_ERROR` | yes |
/// | status 400..500 | `CLIENT_ERROR` | no |
/// | anything else | `UNKNOWN` | no |
pub fn classify(error: &TransportError) -> NetError {
    match error {
        TransportError::Timeout => NetError::new(ErrorKind::Timeout, true, error.to_string()),
        TransportError::Network(_) => {
            NetError::new(ErrorKind::NetworkError, true, error.to_string())
        }
        TransportError::Status {
            status: 429,
            retry_after,
        } => {
            let secs = retry_after
                .as_deref()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            NetError {
                kind: ErrorKind::RateLimited,
                retryable: true,
                retry_after: Some(secs),
                status: Some(429),
                message: error.to_string(),
            }
        }
        TransportError::Status { status, .. } if *status >= 500 => NetError {
            status: Some(*status),
            ..NetError::new(ErrorKind::ServerError, true, error.to_string())
        },
        TransportError::Status { status, .. } if (400..500).contains(status) => NetError {
            status: Some(*status),
            ..NetError::new(ErrorKind::ClientError, false, error.to_string())
        },
        TransportError::Status { status, .. } => NetError {
            status: Some(*status),
            ..NetError::unknown(error.to_string())
        },
        TransportError::Aborted | TransportError::Other(_) => NetError::unknown(error.to_string()),
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then re-send.
    RetryAfter(Duration),
    /// Surface the error to the caller.
    GiveUp,
}

/// Decides whether and when a failed call is retried.
#[derive(Debug, Clone, Default)]
pub struct RetryEngine {
    config: RetryConfig,
}

impl RetryEngine {
    /// Creates an engine with the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns true if `error` should be retried, ignoring the budget.
    ///
    /// A configured predicate decides alone. Otherwise, an error with an
    /// HTTP status is retried when the status is in the retryable set, and
    /// an error without one follows its classification.
    pub fn is_retryable(&self, error: &NetError) -> bool {
        if let Some(predicate) = &self.config.should_retry {
            return predicate(error);
        }
        match error.status {
            Some(status) => self.config.retryable_statuses.contains(&status),
            None => error.retryable,
        }
    }

    /// Computes the wait before retry number `retry_count + 1`.
    ///
    /// A server-supplied `retry_after` is honored as-is; otherwise the wait
    /// is `base_delay * 2^retry_count` plus random jitter below
    /// `max_jitter`.
    pub fn delay_for(&self, error: &NetError, retry_count: u32) -> Duration {
        if let Some(secs) = error.retry_after {
            return Duration::from_secs(secs);
        }

        let factor = 2u32.saturating_pow(retry_count);
        let backoff = self.config.base_delay.saturating_mul(factor);
        backoff.saturating_add(self.jitter())
    }

    /// Decides what to do after the attempt tagged `retry_count` failed.
    pub fn decide(&self, error: &NetError, retry_count: u32) -> RetryDecision {
        if retry_count >= self.config.max_retries || !self.is_retryable(error) {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.delay_for(error, retry_count))
    }

    fn jitter(&self) -> Duration {
        let max = u64::try_from(self.config.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max))
    }
}
