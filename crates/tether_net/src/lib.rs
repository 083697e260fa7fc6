//! # Tether Net
//!
//! Network resilience for the tether offline-first layer.
//!
//! This crate provides:
//! - An explicit transport boundary ([`Transport`], [`TransportError`])
//! - Error classification into a fixed taxonomy ([`classify`], [`ErrorKind`])
//! - Retry with exponential backoff and jitter ([`RetryEngine`])
//! - Collapsing of concurrent identical reads ([`Deduplicator`])
//! - A sliding-window admission check ([`RateLimiter`])
//! - Connectivity state ([`Connectivity`]) and error reporting ([`ErrorReporter`])
//! - [`NetworkInterceptor`], which composes all of the above around a transport
//! - Deep link generation and parsing ([`deep_link`])
//!
//! ## Request flow
//!
//! 1. The rate limiter admits or rejects the call
//! 2. GET calls with an identical key share one execution
//! 3. The transport sends; a non-2xx status becomes a [`TransportError::Status`]
//! 4. The error is classified; retryable errors back off and re-send while
//!    online, everything else is reported and returned

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connectivity;
mod dedup;
pub mod deep_link;
mod error;
mod http;
mod interceptor;
mod rate_limit;
mod report;
mod retry;
mod transport;

pub use config::{DedupConfig, RateLimitConfig, RetryConfig, RetryPredicate};
pub use connectivity::{Connectivity, ManualConnectivity};
pub use dedup::{cache_key, Deduplicator};
pub use deep_link::{generate_deep_link, parse_deep_link, DeepLink, DeepLinkError};
pub use error::{ErrorKind, IsNetworkFailure, NetError, NetResult, TransportError};
pub use http::ReqwestTransport;
pub use interceptor::{InterceptorBuilder, NetworkInterceptor};
pub use rate_limit::RateLimiter;
pub use report::{ErrorReporter, ReportContext, TracingReporter};
pub use retry::{classify, RetryDecision, RetryEngine};
pub use transport::{NetRequest, NetResponse, Transport};
