//! A transport that replays scripted replies.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tether_net::{NetRequest, NetResponse, Transport, TransportError};

/// A [`Transport`] serving replies in order and recording every request.
///
/// Once the script runs out every request gets `200` with an empty body.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<NetResponse, TransportError>>>,
    requests: Mutex<Vec<NetRequest>>,
}

impl ScriptedTransport {
    /// Creates a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push_response(&self, response: NetResponse) {
        self.replies.lock().push_back(Ok(response));
    }

    /// Queues a failure.
    pub fn push_error(&self, error: TransportError) {
        self.replies.lock().push_back(Err(error));
    }

    /// Returns how many requests were sent.
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns every request sent, in order.
    pub fn requests(&self) -> Vec<NetRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &NetRequest) -> Result<NetResponse, TransportError> {
        self.requests.lock().push(request.clone());
        let reply = self.replies.lock().pop_front();
        reply.unwrap_or_else(|| Ok(NetResponse::ok("")))
    }
}
