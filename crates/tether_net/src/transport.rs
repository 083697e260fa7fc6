//! The transport boundary.

use crate::error::TransportError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use tether_protocol::{HttpMethod, QueuedRequest};

/// An outbound request as seen by the interceptor and transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Target URL without the query string.
    pub url: String,
    /// Query parameters, in order.
    pub query: Vec<(String, String)>,
    /// Request headers.
    pub headers: BTreeMap<String, String>,
    /// Serialized body.
    pub body: Option<String>,
    /// Per-request timeout; the transport default applies when `None`.
    pub timeout: Option<Duration>,
    /// Retries already performed for this call.
    pub retry_count: u32,
}

impl NetRequest {
    /// Creates a request with no query, headers or body.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
            retry_count: 0,
        }
    }

    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Creates a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    /// Appends a query parameter.
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Sets a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns the deduplication key of this request.
    pub fn cache_key(&self) -> String {
        crate::dedup::cache_key(self.method, &self.url, &self.query, self.body.as_deref())
    }
}

impl From<&QueuedRequest> for NetRequest {
    fn from(request: &QueuedRequest) -> Self {
        Self {
            method: request.method,
            url: request.url.clone(),
            query: Vec::new(),
            headers: request.headers.clone(),
            body: request.body.clone(),
            timeout: None,
            retry_count: 0,
        }
    }
}

/// A response received from the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers with lower-cased names.
    pub headers: BTreeMap<String, String>,
    /// Response body.
    pub body: String,
}

impl NetResponse {
    /// Creates a response with the given status and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Creates a `200 OK` response.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    /// Adds a header; the name is lower-cased.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Looks up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Sends requests over the wire.
///
/// Implementations return `Ok` for every response that was received,
/// whatever its status; only failures to obtain a response are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request.
    async fn send(&self, request: &NetRequest) -> Result<NetResponse, TransportError>;
}
