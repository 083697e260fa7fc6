//! The remote side of synchronization.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tether_protocol::{ChangeSet, PullRequest, PullResponse, PushRequest, PushResponse, Timestamp};

/// The source of truth the local store is reconciled with.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetches changes since `request.last_pulled_at`.
    async fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse>;

    /// Sends local changes.
    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse>;
}

/// A scripted remote for testing.
///
/// Pull replies are served in order; once the script runs out, pulls
/// return no changes at the last served timestamp. Pushes succeed unless a
/// failure is scripted.
#[derive(Debug, Default)]
pub struct MockRemote {
    pulls: Mutex<VecDeque<SyncResult<PullResponse>>>,
    pushes: Mutex<VecDeque<SyncResult<PushResponse>>>,
    last_timestamp: Mutex<Timestamp>,
    pull_requests: Mutex<Vec<PullRequest>>,
    push_requests: Mutex<Vec<PushRequest>>,
}

impl MockRemote {
    /// Creates a mock remote with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a pull reply.
    pub fn push_pull_response(&self, response: PullResponse) {
        self.pulls.lock().push_back(Ok(response));
    }

    /// Queues a pull failure.
    pub fn fail_next_pull(&self, error: SyncError) {
        self.pulls.lock().push_back(Err(error));
    }

    /// Queues a push reply.
    pub fn push_push_response(&self, response: PushResponse) {
        self.pushes.lock().push_back(Ok(response));
    }

    /// Queues a push failure.
    pub fn fail_next_push(&self, error: SyncError) {
        self.pushes.lock().push_back(Err(error));
    }

    /// Returns every pull request received.
    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.pull_requests.lock().clone()
    }

    /// Returns every push request received.
    pub fn push_requests(&self) -> Vec<PushRequest> {
        self.push_requests.lock().clone()
    }
}

#[async_trait]
impl RemoteSource for MockRemote {
    async fn pull(&self, request: &PullRequest) -> SyncResult<PullResponse> {
        self.pull_requests.lock().push(request.clone());
        let scripted = self.pulls.lock().pop_front();
        match scripted {
            Some(Ok(response)) => {
                *self.last_timestamp.lock() = response.timestamp;
                Ok(response)
            }
            Some(Err(err)) => Err(err),
            None => Ok(PullResponse::new(ChangeSet::new(), *self.last_timestamp.lock())),
        }
    }

    async fn push(&self, request: &PushRequest) -> SyncResult<PushResponse> {
        self.push_requests.lock().push(request.clone());
        let scripted = self.pushes.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(PushResponse::success()))
    }
}
