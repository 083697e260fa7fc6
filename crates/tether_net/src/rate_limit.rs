//! Sliding-window admission control.

use crate::config::RateLimitConfig;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tether_protocol::{Clock, SystemClock, Timestamp};
use tracing::debug;

/// A per-process sliding-window rate limiter.
///
/// Keeps the timestamps of admitted calls; a call is admitted while fewer
/// than `max_requests` of them fall inside the trailing window.
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    admitted: Mutex<VecDeque<Timestamp>>,
}

impl RateLimiter {
    /// Creates a limiter driven by the system clock.
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a limiter driven by the given clock.
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            admitted: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Admits or rejects one call. An admitted call is recorded.
    pub fn check(&self) -> bool {
        let now = self.clock.now();
        let mut admitted = self.admitted.lock();
        self.prune(&mut admitted, now);

        if admitted.len() >= self.config.max_requests {
            debug!(
                max_requests = self.config.max_requests,
                "rate limit reached"
            );
            return false;
        }
        admitted.push_back(now);
        true
    }

    /// Forgets every recorded call.
    pub fn reset(&self) {
        self.admitted.lock().clear();
    }

    /// Returns how many more calls the current window admits.
    pub fn remaining(&self) -> usize {
        let now = self.clock.now();
        let mut admitted = self.admitted.lock();
        self.prune(&mut admitted, now);
        self.config.max_requests.saturating_sub(admitted.len())
    }

    /// Returns how long until the oldest recorded call leaves the window,
    /// or zero if a call would be admitted now.
    pub fn retry_after(&self) -> Duration {
        let now = self.clock.now();
        let mut admitted = self.admitted.lock();
        self.prune(&mut admitted, now);
        if admitted.len() < self.config.max_requests {
            return Duration::ZERO;
        }
        admitted
            .front()
            .map(|oldest| {
                oldest
                    .saturating_add(self.config.window)
                    .duration_since(now)
            })
            .unwrap_or(Duration::ZERO)
    }

    fn prune(&self, admitted: &mut VecDeque<Timestamp>, now: Timestamp) {
        while let Some(oldest) = admitted.front() {
            if now.duration_since(*oldest) >= self.config.window {
                admitted.pop_front();
            } else {
                break;
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("admitted", &self.admitted.lock().len())
            .finish()
    }
}
