//! A queue handler that records what it is asked to do.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tether_net::{ErrorKind, ManualConnectivity, NetError, NetResult};
use tether_protocol::QueuedRequest;
use tether_queue::RequestHandler;

/// A [`RequestHandler`] recording every invocation.
///
/// Succeeds by default. Failures are `SERVER_ERROR`s.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    invocations: Mutex<Vec<QueuedRequest>>,
    failures_left: Mutex<Option<usize>>,
    disconnect: Option<(usize, Arc<ManualConnectivity>)>,
}

impl RecordingHandler {
    /// Creates a handler that always succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handler that always fails.
    pub fn failing() -> Self {
        Self {
            failures_left: Mutex::new(Some(usize::MAX)),
            ..Self::default()
        }
    }

    /// Fails the first `n` invocations, then succeeds.
    pub fn fail_first(self, n: usize) -> Self {
        *self.failures_left.lock() = Some(n);
        self
    }

    /// Sets `connectivity` offline on the `n`th invocation.
    pub fn disconnect_after(mut self, n: usize, connectivity: Arc<ManualConnectivity>) -> Self {
        self.disconnect = Some((n, connectivity));
        self
    }

    /// Returns every request handled, in order.
    pub fn invocations(&self) -> Vec<QueuedRequest> {
        self.invocations.lock().clone()
    }

    /// Returns the URLs of every request handled, in order.
    pub fn urls(&self) -> Vec<String> {
        self.invocations.lock().iter().map(|r| r.url.clone()).collect()
    }
}

#[async_trait]
impl RequestHandler for RecordingHandler {
    async fn handle(&self, request: &QueuedRequest) -> NetResult<()> {
        let count = {
            let mut invocations = self.invocations.lock();
            invocations.push(request.clone());
            invocations.len()
        };
        if let Some((after, connectivity)) = &self.disconnect {
            if count == *after {
                connectivity.set_connected(false);
            }
        }

        let mut failures_left = self.failures_left.lock();
        match failures_left.as_mut() {
            Some(n) if *n > 0 => {
                *n -= 1;
                Err(NetError::new(ErrorKind::ServerError, true, "scripted failure"))
            }
            _ => Ok(()),
        }
    }
}
