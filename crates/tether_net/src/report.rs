//! Error reporting to an operator-facing tracker.

use crate::error::ErrorKind;
use tether_protocol::RequestDescriptor;
use tracing::error;

/// Structured context attached to a reported failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    /// Classified failure kind, when known.
    pub kind: Option<ErrorKind>,
    /// Attempts (or retries) performed before giving up.
    pub attempts: u32,
    /// The request that failed, when known.
    pub request: Option<RequestDescriptor>,
    /// Component that reported the failure.
    pub source: &'static str,
}

impl ReportContext {
    /// Creates a context for the given component.
    pub fn new(source: &'static str) -> Self {
        Self {
            kind: None,
            attempts: 0,
            request: None,
            source,
        }
    }

    /// Sets the failure kind.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Sets the attempt count.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the failed request.
    pub fn with_request(mut self, request: RequestDescriptor) -> Self {
        self.request = Some(request);
        self
    }
}

/// Receives failures that exhausted their retry budget or were not
/// retryable.
pub trait ErrorReporter: Send + Sync {
    /// Reports one failure.
    fn report(&self, message: &str, context: &ReportContext);
}

/// Reports failures as `tracing` error events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, message: &str, context: &ReportContext) {
        error!(
            source = context.source,
            kind = context.kind.map(|k| k.as_str()).unwrap_or("UNKNOWN"),
            attempts = context.attempts,
            method = context.request.as_ref().map(|r| r.method.as_str()),
            url = context.request.as_ref().map(|r| r.url.as_str()),
            "{message}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_protocol::HttpMethod;

    #[test]
    fn context_builder() {
        let ctx = ReportContext::new("queue")
            .with_kind(ErrorKind::ServerError)
            .with_attempts(3)
            .with_request(RequestDescriptor::new(HttpMethod::Post, "/items"));
        assert_eq!(ctx.kind, Some(ErrorKind::ServerError));
        assert_eq!(ctx.attempts, 3);
        assert_eq!(ctx.request.unwrap().url, "/items");

        TracingReporter.report("dropped", &ReportContext::new("test"));
    }
}
