//! HTTP remote over the network interceptor.

use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteSource;
use async_trait::async_trait;
use tether_net::NetworkInterceptor;
use tether_protocol::{HttpMethod, PullRequest, PullResponse, PushRequest, PushResponse};
use tracing::debug;
use url::Url;

/// Path of the pull endpoint, relative to the base URL.
pub const PULL_PATH: &str = "sync/pull";
/// Path of the push endpoint, relative to the base URL.
pub const PUSH_PATH: &str = "sync/push";

/// A [`RemoteSource`] speaking JSON over HTTP.
///
/// Pull and push are both `POST` requests, so they are never deduplicated
/// and go through the interceptor's retry policy.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    interceptor: NetworkInterceptor,
    pull_url: String,
    push_url: String,
}

impl HttpRemote {
    /// Creates a remote rooted at `base_url`, e.g. `https://api.example.com/v1/`.
    pub fn new(interceptor: NetworkInterceptor, base_url: &Url) -> SyncResult<Self> {
        let join = |path: &str| {
            base_url
                .join(path)
                .map(String::from)
                .map_err(|e| SyncError::Protocol(format!("invalid sync URL: {e}")))
        };
        Ok(Self {
            pull_url: join(PULL_PATH)?,
            push_url: join(PUSH_PATH)?,
            interceptor,
        })
    }

    /// Returns the pull endpoint.
    pub fn pull_url(&self) -> &str {
        &self.pull_url
    }

    /// Returns the push endpoint.
    pub fn push_url(&self) -> &str {
        &self.push_url
    }
}

#[async_trait]
impl RemoteSource for HttpRemote {
    async fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        debug!(url = %self.pull_url, full = request.is_full(), "pulling changes");
        Ok(self
            .interceptor
            .send_json(HttpMethod::Post, &self.pull_url, request)
            .await?)
    }

    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        debug!(url = %self.push_url, records = request.changes.record_count(), "pushing changes");
        Ok(self
            .interceptor
            .send_json(HttpMethod::Post, &self.push_url, request)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tether_net::{NetRequest, NetResponse, Transport, TransportError};

    struct Echo;

    #[async_trait]
    impl Transport for Echo {
        async fn send(&self, request: &NetRequest) -> Result<NetResponse, TransportError> {
            if request.url.ends_with("/sync/pull") {
                Ok(NetResponse::ok(r#"{"changes":{"notes":{"created":[{"id":"a","updatedAt":5,"title":"x"}]}},"timestamp":42}"#))
            } else {
                Ok(NetResponse::ok(r#"{"success":true}"#))
            }
        }
    }

    fn remote() -> HttpRemote {
        let interceptor = NetworkInterceptor::builder(Arc::new(Echo)).build();
        HttpRemote::new(interceptor, &Url::parse("https://api.example.com/v1/").unwrap()).unwrap()
    }

    #[test]
    fn endpoints_join_base() {
        let remote = remote();
        assert_eq!(remote.pull_url(), "https://api.example.com/v1/sync/pull");
        assert_eq!(remote.push_url(), "https://api.example.com/v1/sync/push");
    }

    #[tokio::test]
    async fn decodes_pull_and_push() {
        let remote = remote();
        let pulled = remote.pull(&PullRequest::full(1)).await.unwrap();
        assert_eq!(pulled.timestamp.as_millis(), 42);
        let notes = pulled.changes.table("notes").unwrap();
        assert_eq!(notes.created[0].updated_at.as_millis(), 5);

        let pushed = remote
            .push(&PushRequest::new(Default::default(), None))
            .await
            .unwrap();
        assert!(pushed.success);
    }
}
