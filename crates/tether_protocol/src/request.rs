//! Requests held by the offline queue.

use crate::error::ProtocolError;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// HTTP method of a queued or intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Returns the canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Returns true for methods that are assumed to have side effects.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(ProtocolError::UnknownMethod(s.to_string())),
        }
    }
}

/// The caller-supplied part of a request to be queued.
///
/// The queue turns a descriptor into a [`QueuedRequest`] by assigning an
/// id and a creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// Target URL.
    pub url: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request body, already serialized.
    #[serde(default)]
    pub body: Option<String>,
    /// Priority; higher is served first.
    #[serde(default)]
    pub priority: i32,
}

impl RequestDescriptor {
    /// Creates a descriptor with no headers, no body and priority 0.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: BTreeMap::new(),
            body: None,
            priority: 0,
        }
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

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// A request persisted by the offline queue until it succeeds or exhausts
/// its retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRequest {
    /// Unique id assigned at enqueue time.
    pub id: String,
    /// Target URL.
    pub url: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request body, already serialized.
    #[serde(default)]
    pub body: Option<String>,
    /// Priority; higher is served first.
    #[serde(default)]
    pub priority: i32,
    /// Execution attempts so far.
    #[serde(default)]
    pub attempts: u32,
    /// Enqueue time; FIFO tie-break within equal priority.
    pub created_at: Timestamp,
    /// Time of the most recent attempt.
    #[serde(default)]
    pub last_attempt_at: Option<Timestamp>,
}

impl QueuedRequest {
    /// Builds a fresh queue entry from a descriptor.
    pub fn from_descriptor(
        id: impl Into<String>,
        descriptor: RequestDescriptor,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            url: descriptor.url,
            method: descriptor.method,
            headers: descriptor.headers,
            body: descriptor.body,
            priority: descriptor.priority,
            attempts: 0,
            created_at,
            last_attempt_at: None,
        }
    }

    /// Returns the descriptor this entry was built from.
    pub fn descriptor(&self) -> RequestDescriptor {
        RequestDescriptor {
            url: self.url.clone(),
            method: self.method,
            headers: self.headers.clone(),
            body: self.body.clone(),
            priority: self.priority,
        }
    }

    /// Drain order: priority descending, then `created_at` ascending.
    pub fn drain_order(a: &QueuedRequest, b: &QueuedRequest) -> std::cmp::Ordering {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parse_and_display() {
        assert_eq!("patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
        assert!(matches!(
            "TRACE".parse::<HttpMethod>(),
            Err(ProtocolError::UnknownMethod(_))
        ));
    }

    #[test]
    fn only_get_is_read_only() {
        assert!(!HttpMethod::Get.is_mutating());
        for m in [HttpMethod::Post, HttpMethod::Put, HttpMethod::Patch, HttpMethod::Delete] {
            assert!(m.is_mutating());
        }
    }

    #[test]
    fn queued_request_from_descriptor() {
        let descriptor = RequestDescriptor::new(HttpMethod::Post, "https://api.example.com/notes")
            .with_header("content-type", "application/json")
            .with_body(r#"{"title":"a"}"#)
            .with_priority(5);

        let queued = QueuedRequest::from_descriptor("id-1", descriptor.clone(), Timestamp::from_millis(10));
        assert_eq!(queued.attempts, 0);
        assert_eq!(queued.last_attempt_at, None);
        assert_eq!(queued.priority, 5);
        assert_eq!(queued.descriptor(), descriptor);
    }

    #[test]
    fn drain_order_prefers_priority_then_age() {
        let make = |priority, created| {
            QueuedRequest::from_descriptor(
                format!("{priority}-{created}"),
                RequestDescriptor::new(HttpMethod::Post, "/x").with_priority(priority),
                Timestamp::from_millis(created),
            )
        };
        let mut entries = vec![make(1, 1), make(5, 2), make(1, 0), make(5, 3)];
        entries.sort_by(QueuedRequest::drain_order);
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["5-2", "5-3", "1-0", "1-1"]);
    }

    #[test]
    fn queued_request_json_shape() {
        let queued = QueuedRequest::from_descriptor(
            "abc",
            RequestDescriptor::new(HttpMethod::Put, "/items/1"),
            Timestamp::from_millis(7),
        );
        let json = serde_json::to_value(&queued).unwrap();
        assert_eq!(json["method"], "PUT");
        assert_eq!(json["created_at"], 7);

        let back: QueuedRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, queued);
    }
}
