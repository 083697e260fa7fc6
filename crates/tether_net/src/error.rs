//! Error types for the network layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for intercepted network operations.
pub type NetResult<T> = Result<T, NetError>;

/// A failure reported by a [`crate::Transport`].
///
/// This is the explicit boundary between the HTTP client and the rest of
/// the layer: every client failure must be mapped onto one of these
/// variants so classification never has to inspect message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request timed out before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// No response was received at all (connection refused, DNS failure,
    /// connectivity drop).
    #[error("network error: {0}")]
    Network(String),

    /// The caller aborted the request.
    #[error("request aborted")]
    Aborted,

    /// The server answered with a non-success status.
    #[error("HTTP status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw `Retry-After` header, if present.
        retry_after: Option<String>,
    },

    /// Any other client-side failure.
    #[error("transport failure: {0}")]
    Other(String),
}

/// Classification of a failed network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The transport reported a timeout.
    Timeout,
    /// No response was received.
    NetworkError,
    /// HTTP 429.
    RateLimited,
    /// HTTP 5xx.
    ServerError,
    /// HTTP 4xx other than 429.
    ClientError,
    /// Anything else, including aborted requests.
    Unknown,
}

impl ErrorKind {
    /// Returns the upper-case name used in logs and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::RateLimited => "RATE_LIMITED",
            ErrorKind::ServerError => "SERVER_ERROR",
            ErrorKind::ClientError => "CLIENT_ERROR",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified network failure as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct NetError {
    /// Error classification.
    pub kind: ErrorKind,
    /// Whether the classification considers the failure transient.
    pub retryable: bool,
    /// Server-requested wait, in seconds.
    pub retry_after: Option<u64>,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Human-readable description.
    pub message: String,
}

impl NetError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, retryable: bool, message: impl Into<String>) -> Self {
        Self {
            kind,
            retryable,
            retry_after: None,
            status: None,
            message: message.into(),
        }
    }

    /// Creates a non-retryable `UNKNOWN` error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, false, message)
    }

    /// Creates the error returned when the local rate limiter rejects a call.
    pub fn rate_limited_locally(retry_after: u64) -> Self {
        Self {
            kind: ErrorKind::RateLimited,
            retryable: false,
            retry_after: Some(retry_after),
            status: None,
            message: "local rate limit exceeded".to_string(),
        }
    }
}

/// Distinguishes transport-level failures (worth queueing for later) from
/// everything else.
///
/// Only timeouts and "no response" failures qualify. Aborted requests,
/// HTTP error statuses and validation errors do not.
pub trait IsNetworkFailure {
    /// Returns true if the failure means the request never reached a
    /// server that could answer it.
    fn is_network_failure(&self) -> bool;
}

impl IsNetworkFailure for TransportError {
    fn is_network_failure(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Network(_))
    }
}

impl IsNetworkFailure for NetError {
    fn is_network_failure(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout | ErrorKind::NetworkError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(ErrorKind::RateLimited.to_string(), "RATE_LIMITED");
        assert_eq!(
            serde_json::to_string(&ErrorKind::NetworkError).unwrap(),
            "\"NETWORK_ERROR\""
        );
    }

    #[test]
    fn network_failures() {
        assert!(TransportError::Timeout.is_network_failure());
        assert!(TransportError::Network("connection refused".into()).is_network_failure());
        assert!(!TransportError::Aborted.is_network_failure());
        assert!(!TransportError::Status {
            status: 503,
            retry_after: None
        }
        .is_network_failure());

        assert!(NetError::new(ErrorKind::Timeout, true, "t").is_network_failure());
        assert!(!NetError::unknown("validation failed").is_network_failure());
    }

    #[test]
    fn error_display() {
        let err = NetError::new(ErrorKind::ServerError, true, "HTTP status 502");
        assert_eq!(err.to_string(), "SERVER_ERROR: HTTP status 502");
        assert_eq!(
            TransportError::Status {
                status: 404,
                retry_after: None
            }
            .to_string(),
            "HTTP status 404"
        );
    }
}
