//! Queue-on-failure wrapper for network calls.

use crate::queue::OfflineQueue;
use std::future::Future;
use tether_net::IsNetworkFailure;
use tether_protocol::RequestDescriptor;
use tracing::info;

/// Runs `call`; if it fails with a network failure, queues `descriptor`
/// for replay.
///
/// The result of `call` is returned unchanged either way, so callers still
/// see the original error and decide how to present a queued write.
/// Failures that are not network failures (HTTP errors, aborted requests,
/// validation errors) are never queued.
pub async fn with_offline_queue<T, E, F>(
    queue: &OfflineQueue,
    descriptor: RequestDescriptor,
    call: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: IsNetworkFailure,
{
    let result = call.await;
    if let Err(err) = &result {
        if err.is_network_failure() {
            let url = descriptor.url.clone();
            let id = queue.add_request(descriptor).await;
            info!(%id, %url, "network failure, request queued for replay");
        }
    }
    result
}
