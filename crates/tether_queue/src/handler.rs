//! The seam through which queued requests are executed.

use async_trait::async_trait;
use tether_net::{NetError, NetRequest, NetResult, NetworkInterceptor};
use tether_protocol::QueuedRequest;
use tracing::debug;
use url::Url;

/// Executes one queued request. An `Err` counts as a failed attempt.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Performs the network call for `request`.
    async fn handle(&self, request: &QueuedRequest) -> NetResult<()>;
}

/// A handler that replays requests through a [`NetworkInterceptor`].
///
/// Relative URLs are resolved against the base URL when one is set.
#[derive(Debug, Clone)]
pub struct InterceptorHandler {
    interceptor: NetworkInterceptor,
    base_url: Option<Url>,
}

impl InterceptorHandler {
    /// Creates a handler over the given interceptor.
    pub fn new(interceptor: NetworkInterceptor) -> Self {
        Self {
            interceptor,
            base_url: None,
        }
    }

    /// Sets the base URL used for relative request URLs.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    fn resolve(&self, url: &str) -> NetResult<String> {
        match Url::parse(url) {
            Ok(absolute) => Ok(absolute.into()),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.base_url.as_ref().ok_or_else(|| {
                    NetError::unknown(format!("relative URL '{url}' without a base URL"))
                })?;
                base.join(url)
                    .map(Into::into)
                    .map_err(|e| NetError::unknown(format!("invalid URL '{url}': {e}")))
            }
            Err(e) => Err(NetError::unknown(format!("invalid URL '{url}': {e}"))),
        }
    }
}

#[async_trait]
impl RequestHandler for InterceptorHandler {
    async fn handle(&self, request: &QueuedRequest) -> NetResult<()> {
        let mut outbound = NetRequest::from(request);
        outbound.url = self.resolve(&request.url)?;
        debug!(id = %request.id, url = %outbound.url, "replaying queued request");
        self.interceptor.execute(outbound).await.map(|_| ())
    }
}
