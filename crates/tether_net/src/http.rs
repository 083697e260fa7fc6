//! `reqwest`-backed transport.

use crate::error::TransportError;
use crate::transport::{NetRequest, NetResponse, Transport};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tether_protocol::HttpMethod;
use tracing::trace;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A [`Transport`] over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Creates a transport with a fresh client and the default timeout.
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Creates a transport over an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the timeout used when a request carries none.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a client failure onto the transport boundary.
fn map_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() || err.is_request() {
        TransportError::Network(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &NetRequest) -> Result<NetResponse, TransportError> {
        trace!(method = %request.method, url = %request.url, retry = request.retry_count, "sending");

        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url)
            .timeout(request.timeout.unwrap_or(self.timeout));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(map_error)?;
        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(map_error)?;

        Ok(NetResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_map() {
        assert_eq!(ReqwestTransport::method(HttpMethod::Get), reqwest::Method::GET);
        assert_eq!(
            ReqwestTransport::method(HttpMethod::Delete),
            reqwest::Method::DELETE
        );
    }

    #[tokio::test]
    async fn unreachable_host_is_network_failure() {
        // Port 9 on localhost refuses connections on any sane test host.
        let transport = ReqwestTransport::new().with_timeout(Duration::from_secs(2));
        let err = transport
            .send(&NetRequest::get("http://127.0.0.1:9/"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Network(_) | TransportError::Timeout
        ));
    }
}
