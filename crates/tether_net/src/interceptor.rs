//! Request pipeline composing rate limiting, deduplication and retry.

use crate::config::{DedupConfig, RateLimitConfig, RetryConfig};
use crate::connectivity::{Connectivity, ManualConnectivity};
use crate::dedup::Deduplicator;
use crate::error::{NetError, NetResult, TransportError};
use crate::rate_limit::RateLimiter;
use crate::report::{ErrorReporter, ReportContext, TracingReporter};
use crate::retry::{classify, RetryDecision, RetryEngine};
use crate::transport::{NetRequest, NetResponse, Transport};
use futures::future::{AbortRegistration, Abortable};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tether_protocol::{Clock, HttpMethod, RequestDescriptor, SystemClock};
use tracing::{debug, warn};

/// Builder for [`NetworkInterceptor`].
pub struct InterceptorBuilder {
    transport: Arc<dyn Transport>,
    connectivity: Option<Arc<dyn Connectivity>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
    clock: Option<Arc<dyn Clock>>,
    retry: RetryConfig,
    rate_limit: RateLimitConfig,
    dedup: DedupConfig,
}

impl InterceptorBuilder {
    /// Starts a builder around the given transport.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            connectivity: None,
            reporter: None,
            clock: None,
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            dedup: DedupConfig::default(),
        }
    }

    /// Sets the connectivity provider. Defaults to always online.
    pub fn connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Sets the error reporter. Defaults to [`TracingReporter`].
    pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Sets the clock driving the rate limiter.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the retry configuration.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Sets the rate limit.
    pub fn rate_limit(mut self, config: RateLimitConfig) -> Self {
        self.rate_limit = config;
        self
    }

    /// Sets the deduplication configuration.
    pub fn dedup(mut self, config: DedupConfig) -> Self {
        self.dedup = config;
        self
    }

    /// Builds the interceptor.
    pub fn build(self) -> NetworkInterceptor {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        NetworkInterceptor {
            inner: Arc::new(Inner {
                transport: self.transport,
                connectivity: self
                    .connectivity
                    .unwrap_or_else(|| Arc::new(ManualConnectivity::new(true))),
                reporter: self.reporter.unwrap_or_else(|| Arc::new(TracingReporter)),
                retry: RetryEngine::new(self.retry),
                limiter: RateLimiter::with_clock(self.rate_limit, clock),
            }),
            dedup: Arc::new(Deduplicator::new(self.dedup)),
        }
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    connectivity: Arc<dyn Connectivity>,
    reporter: Arc<dyn ErrorReporter>,
    retry: RetryEngine,
    limiter: RateLimiter,
}

impl Inner {
    async fn send_with_retry(&self, mut request: NetRequest) -> NetResult<NetResponse> {
        loop {
            let failure = match self.transport.send(&request).await {
                Ok(response) if response.is_success() => return Ok(response),
                Ok(response) => TransportError::Status {
                    status: response.status,
                    retry_after: response.header("retry-after").map(str::to_string),
                },
                Err(err) => err,
            };

            let error = classify(&failure);
            match self.retry.decide(&error, request.retry_count) {
                RetryDecision::GiveUp => {
                    self.reporter.report(
                        &error.to_string(),
                        &ReportContext::new("interceptor")
                            .with_kind(error.kind)
                            .with_attempts(request.retry_count)
                            .with_request(descriptor_of(&request)),
                    );
                    return Err(error);
                }
                RetryDecision::RetryAfter(delay) => {
                    debug!(
                        url = %request.url,
                        kind = %error.kind,
                        retry = request.retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    if !self.connectivity.is_connected() {
                        debug!(url = %request.url, "offline after backoff, not retrying");
                        return Err(error);
                    }
                    request.retry_count += 1;
                }
            }
        }
    }
}

fn descriptor_of(request: &NetRequest) -> RequestDescriptor {
    RequestDescriptor {
        url: request.url.clone(),
        method: request.method,
        headers: request.headers.clone(),
        body: request.body.clone(),
        priority: 0,
    }
}

/// Wraps a [`Transport`] with rate limiting, GET deduplication and retry.
///
/// Cloning is cheap and clones share all state.
#[derive(Clone)]
pub struct NetworkInterceptor {
    inner: Arc<Inner>,
    dedup: Arc<Deduplicator<NetResponse, NetError>>,
}

impl NetworkInterceptor {
    /// Starts a builder around the given transport.
    pub fn builder(transport: Arc<dyn Transport>) -> InterceptorBuilder {
        InterceptorBuilder::new(transport)
    }

    /// Executes a request.
    ///
    /// Calls rejected by the rate limiter fail with a non-retryable
    /// `RATE_LIMITED` error without being sent; its `retry_after` is the
    /// time until the window admits a call, rounded up to whole seconds. GET calls with the same
    /// method, URL, query and body share one execution.
    pub async fn execute(&self, request: NetRequest) -> NetResult<NetResponse> {
        if !self.inner.limiter.check() {
            let wait = self.inner.limiter.retry_after();
            let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            warn!(url = %request.url, retry_after = secs, "request rejected by local rate limit");
            return Err(NetError::rate_limited_locally(secs));
        }

        if request.method != HttpMethod::Get {
            return self.inner.send_with_retry(request).await;
        }

        let inner = Arc::clone(&self.inner);
        self.dedup
            .run(request.cache_key(), move || async move {
                inner.send_with_retry(request).await
            })
            .await
    }

    /// Executes a request that the caller may abort through the handle
    /// paired with `registration`.
    ///
    /// An aborted call fails with a non-retryable `UNKNOWN` error.
    pub async fn execute_with_abort(
        &self,
        request: NetRequest,
        registration: AbortRegistration,
    ) -> NetResult<NetResponse> {
        match Abortable::new(self.execute(request), registration).await {
            Ok(result) => result,
            Err(_) => {
                debug!("request aborted by caller");
                Err(classify(&TransportError::Aborted))
            }
        }
    }

    /// Sends `body` as JSON and decodes a JSON response.
    pub async fn send_json<B, R>(&self, method: HttpMethod, url: &str, body: &B) -> NetResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = serde_json::to_string(body)
            .map_err(|e| NetError::unknown(format!("failed to encode request body: {e}")))?;
        let request = NetRequest::new(method, url)
            .with_header("content-type", "application/json")
            .with_header("accept", "application/json")
            .with_body(body);
        let response = self.execute(request).await?;
        response
            .json()
            .map_err(|e| NetError::unknown(format!("failed to decode response body: {e}")))
    }

    /// Forgets every call recorded by the rate limiter.
    pub fn reset_rate_limit(&self) {
        self.inner.limiter.reset();
    }

    /// Returns how many more calls the current rate-limit window admits.
    pub fn remaining_requests(&self) -> usize {
        self.inner.limiter.remaining()
    }

    /// Returns the connectivity provider.
    pub fn connectivity(&self) -> &Arc<dyn Connectivity> {
        &self.inner.connectivity
    }
}

impl std::fmt::Debug for NetworkInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkInterceptor")
            .field("retry", self.inner.retry.config())
            .field("limiter", &self.inner.limiter)
            .field("dedup", &self.dedup)
            .finish()
    }
}
