//! Queue command implementation.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tether_net::{ManualConnectivity, NetworkInterceptor, ReqwestTransport};
use tether_protocol::{HttpMethod, QueuedRequest, RequestDescriptor};
use tether_queue::{DrainReport, InterceptorHandler, OfflineQueue};
use tether_storage::FileStore;
use tracing::info;
use url::Url;

/// One queued request as shown by `queue list`.
#[derive(Debug, Serialize)]
pub struct QueueEntry {
    /// Request id.
    pub id: String,
    /// HTTP method.
    pub method: HttpMethod,
    /// Target URL.
    pub url: String,
    /// Priority.
    pub priority: i32,
    /// Attempts so far.
    pub attempts: u32,
    /// Enqueue time in epoch milliseconds.
    pub created_at: i64,
}

impl From<&QueuedRequest> for QueueEntry {
    fn from(request: &QueuedRequest) -> Self {
        Self {
            id: request.id.clone(),
            method: request.method,
            url: request.url.clone(),
            priority: request.priority,
            attempts: request.attempts,
            created_at: request.created_at.as_millis(),
        }
    }
}

/// Drain outcome as shown by `queue drain`.
#[derive(Debug, Serialize)]
pub struct DrainResult {
    /// Handler invocations.
    pub attempted: usize,
    /// Requests sent successfully.
    pub succeeded: usize,
    /// Requests dropped after their last attempt.
    pub dropped: usize,
    /// Requests left queued.
    pub remaining: usize,
}

fn open_queue(dir: &Path, connected: bool) -> Result<OfflineQueue, Box<dyn std::error::Error>> {
    let store = FileStore::open(dir)?;
    let connectivity = Arc::new(ManualConnectivity::new(connected));
    Ok(OfflineQueue::builder(Arc::new(store), connectivity).build())
}

/// Loads the queue at `dir` in drain order.
pub async fn entries(dir: &Path) -> Result<Vec<QueueEntry>, Box<dyn std::error::Error>> {
    let queue = open_queue(dir, false)?;
    queue.load().await?;
    let mut requests = queue.requests();
    requests.sort_by(QueuedRequest::drain_order);
    Ok(requests.iter().map(QueueEntry::from).collect())
}

/// Runs `queue list`.
pub async fn list(dir: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let entries = entries(dir).await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            if entries.is_empty() {
                println!("Offline queue is empty");
                return Ok(());
            }
            println!("Offline queue ({} requests)", entries.len());
            println!();
            for entry in &entries {
                println!(
                    "  [{:>3}] {:<6} {} (attempts: {}, id: {})",
                    entry.priority,
                    entry.method.as_str(),
                    entry.url,
                    entry.attempts,
                    entry.id
                );
            }
        }
    }

    Ok(())
}

/// Runs `queue add` and returns the new request id.
pub async fn add(
    dir: &Path,
    method: &str,
    url: &str,
    body: Option<String>,
    priority: i32,
) -> Result<String, Box<dyn std::error::Error>> {
    let method: HttpMethod = method.parse()?;
    let queue = open_queue(dir, false)?;
    queue.load().await?;

    let mut descriptor = RequestDescriptor::new(method, url).with_priority(priority);
    if let Some(body) = body {
        descriptor = descriptor.with_body(body);
    }
    let id = queue.add_request(descriptor).await;
    queue.flush().await?;

    println!("Queued {method} {url} as {id}");
    Ok(id)
}

/// Runs `queue clear`.
pub async fn clear(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Clearing offline queue in {:?}", dir);
    let queue = open_queue(dir, false)?;
    let removed = queue.load().await?;
    queue.clear().await;
    queue.flush().await?;

    println!("Removed {removed} queued requests");
    Ok(())
}

/// Runs `queue drain` against the real network.
pub async fn drain(dir: &Path, base_url: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    info!("Draining offline queue in {:?}", dir);
    let queue = open_queue(dir, true)?;
    let interceptor = NetworkInterceptor::builder(Arc::new(ReqwestTransport::new())).build();
    let mut handler = InterceptorHandler::new(interceptor);
    if let Some(base_url) = base_url {
        handler = handler.with_base_url(Url::parse(base_url)?);
    }

    let report = queue.initialize(Arc::new(handler)).await?;
    queue.destroy();
    queue.flush().await?;

    let result = summarize(&report, queue.len());
    println!(
        "Attempted {}, succeeded {}, dropped {}, remaining {}",
        result.attempted, result.succeeded, result.dropped, result.remaining
    );
    Ok(())
}

fn summarize(report: &DrainReport, remaining: usize) -> DrainResult {
    DrainResult {
        attempted: report.attempted,
        succeeded: report.succeeded,
        dropped: report.dropped,
        remaining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn add_then_list_in_drain_order() {
        let dir = TempDir::new().unwrap();
        add(dir.path(), "post", "/a", None, 0).await.unwrap();
        add(dir.path(), "PUT", "/b", Some("{}".into()), 5).await.unwrap();
        add(dir.path(), "DELETE", "/c", None, 0).await.unwrap();

        let listed = entries(dir.path()).await.unwrap();
        let urls: Vec<&str> = listed.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, ["/b", "/a", "/c"]);
        assert_eq!(listed[0].method, HttpMethod::Put);
    }

    #[tokio::test]
    async fn list_prints_both_formats() {
        let dir = TempDir::new().unwrap();
        add(dir.path(), "GET", "/items", None, 2).await.unwrap();
        list(dir.path(), "text").await.unwrap();
        list(dir.path(), "json").await.unwrap();
    }

    #[tokio::test]
    async fn clear_empties_persisted_queue() {
        let dir = TempDir::new().unwrap();
        add(dir.path(), "POST", "/a", None, 0).await.unwrap();
        clear(dir.path()).await.unwrap();
        assert!(entries(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_rejects_unknown_method() {
        let dir = TempDir::new().unwrap();
        assert!(add(dir.path(), "BREW", "/pot", None, 0).await.is_err());
    }

    #[tokio::test]
    async fn list_of_missing_queue_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(entries(dir.path()).await.unwrap().is_empty());
    }

    #[test]
    fn drain_summary() {
        let report = DrainReport {
            attempted: 3,
            succeeded: 1,
            dropped: 1,
            requeued: 1,
            stopped_offline: false,
        };
        let result = summarize(&report, 1);
        assert_eq!(result.remaining, 1);
        assert_eq!(serde_json::to_value(&result).unwrap()["dropped"], 1);
    }
}
