//! The offline queue.

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::handler::RequestHandler;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tether_net::{Connectivity, ErrorReporter, ReportContext, TracingReporter};
use tether_protocol::{Clock, QueuedRequest, RequestDescriptor, SystemClock, Timestamp};
use tether_storage::KeyValueStore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Handler invocations.
    pub attempted: usize,
    /// Requests that succeeded and were removed.
    pub succeeded: usize,
    /// Requests dropped after exhausting their attempts.
    pub dropped: usize,
    /// Requests that failed and stay queued.
    pub requeued: usize,
    /// True if connectivity was lost mid-drain.
    pub stopped_offline: bool,
}

impl DrainReport {
    fn absorb(&mut self, pass: DrainReport) {
        self.attempted += pass.attempted;
        self.succeeded += pass.succeeded;
        self.dropped += pass.dropped;
        self.requeued += pass.requeued;
        self.stopped_offline = pass.stopped_offline;
    }
}

/// A point-in-time summary of the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Queued requests.
    pub size: usize,
    /// Creation time of the oldest request.
    pub oldest_created_at: Option<Timestamp>,
    /// Highest priority present.
    pub highest_priority: Option<i32>,
    /// Attempts spent on requests still queued.
    pub pending_attempts: u32,
}

/// Releases the drain flag on every exit path.
struct DrainGuard<'a>(&'a AtomicBool);

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Builder for [`OfflineQueue`].
pub struct OfflineQueueBuilder {
    store: Arc<dyn KeyValueStore>,
    connectivity: Arc<dyn Connectivity>,
    config: QueueConfig,
    clock: Option<Arc<dyn Clock>>,
    reporter: Option<Arc<dyn ErrorReporter>>,
}

impl OfflineQueueBuilder {
    /// Sets the configuration.
    pub fn config(mut self, config: QueueConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the clock used for `created_at` and `last_attempt_at`.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the reporter notified when a request is dropped.
    pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Builds the queue. Nothing is loaded until [`OfflineQueue::initialize`]
    /// or [`OfflineQueue::load`].
    pub fn build(self) -> OfflineQueue {
        OfflineQueue {
            shared: Arc::new(Shared {
                config: self.config,
                store: self.store,
                connectivity: self.connectivity,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                reporter: self.reporter.unwrap_or_else(|| Arc::new(TracingReporter)),
                entries: Mutex::new(Vec::new()),
                handler: RwLock::new(None),
                draining: AtomicBool::new(false),
                needs_drain: AtomicBool::new(false),
                watcher: Mutex::new(None),
                persist_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }
}

struct Shared {
    config: QueueConfig,
    store: Arc<dyn KeyValueStore>,
    connectivity: Arc<dyn Connectivity>,
    clock: Arc<dyn Clock>,
    reporter: Arc<dyn ErrorReporter>,
    entries: Mutex<Vec<QueuedRequest>>,
    handler: RwLock<Option<Arc<dyn RequestHandler>>>,
    draining: AtomicBool,
    /// Set when a drain stopped offline; cleared when a pass starts.
    needs_drain: AtomicBool,
    watcher: Mutex<Option<JoinHandle<()>>>,
    persist_lock: tokio::sync::Mutex<()>,
}

/// A persistent queue of requests replayed in priority order when online.
///
/// Requests are ordered by priority (highest first), then by creation
/// time. At capacity the lowest-ordered request is evicted. Each drain
/// pass gives every request one attempt; a request that fails
/// `max_attempts` times is dropped and reported.
///
/// Cloning is cheap and clones share all state.
#[derive(Clone)]
pub struct OfflineQueue {
    shared: Arc<Shared>,
}

impl OfflineQueue {
    /// Starts a builder with the default configuration.
    pub fn builder(
        store: Arc<dyn KeyValueStore>,
        connectivity: Arc<dyn Connectivity>,
    ) -> OfflineQueueBuilder {
        OfflineQueueBuilder {
            store,
            connectivity,
            config: QueueConfig::default(),
            clock: None,
            reporter: None,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Loads the persisted queue, installs the handler, starts watching
    /// connectivity and drains if online.
    ///
    /// A persisted queue that cannot be read is logged and treated as
    /// empty. Returns the report of the initial drain.
    pub async fn initialize(&self, handler: Arc<dyn RequestHandler>) -> QueueResult<DrainReport> {
        {
            let mut slot = self.shared.handler.write();
            if slot.is_some() {
                return Err(QueueError::AlreadyInitialized);
            }
            *slot = Some(handler);
        }

        if let Err(e) = self.load().await {
            warn!(error = %e, "failed to load persisted queue, starting empty");
        }

        let changes = self.shared.connectivity.subscribe();
        let online = *changes.borrow();
        let watcher = spawn_watcher(Arc::downgrade(&self.shared), changes, online);
        *self.shared.watcher.lock() = Some(watcher);

        Ok(self.drain().await)
    }

    /// Replaces the in-memory queue with the persisted one, keeping
    /// requests added in this process that are not persisted yet.
    ///
    /// Returns the number of queued requests.
    pub async fn load(&self) -> QueueResult<usize> {
        let persisted = match self.shared.store.get(&self.shared.config.storage_key).await? {
            Some(json) => serde_json::from_str::<Vec<QueuedRequest>>(&json)?,
            None => Vec::new(),
        };

        let size = {
            let mut entries = self.shared.entries.lock();
            let pending: Vec<QueuedRequest> = entries
                .drain(..)
                .filter(|e| !persisted.iter().any(|p| p.id == e.id))
                .collect();
            entries.extend(persisted);
            entries.extend(pending);
            entries.len()
        };
        info!(size, "loaded offline queue");
        Ok(size)
    }

    /// Persists the queue, returning any storage failure.
    pub async fn flush(&self) -> QueueResult<()> {
        let _serial = self.shared.persist_lock.lock().await;
        let json = {
            let entries = self.shared.entries.lock();
            serde_json::to_string(&*entries)?
        };
        self.shared
            .store
            .set(&self.shared.config.storage_key, &json)
            .await?;
        Ok(())
    }

    async fn persist(&self) {
        if let Err(e) = self.flush().await {
            warn!(error = %e, "failed to persist offline queue");
        }
    }

    /// Queues a request and returns its id.
    ///
    /// At capacity the queue keeps the `max_size` highest-ordered requests,
    /// which may evict the new request itself. A drain is started in the
    /// background if the queue is initialized and online.
    pub async fn add_request(&self, descriptor: RequestDescriptor) -> String {
        let id = Uuid::new_v4().to_string();
        let request = QueuedRequest::from_descriptor(id.clone(), descriptor, self.shared.clock.now());

        {
            let mut entries = self.shared.entries.lock();
            entries.push(request);
            if entries.len() > self.shared.config.max_size {
                entries.sort_by(QueuedRequest::drain_order);
                for evicted in entries.drain(self.shared.config.max_size..) {
                    warn!(id = %evicted.id, priority = evicted.priority, "offline queue full, evicting request");
                }
            }
        }
        debug!(%id, "queued request");
        self.persist().await;

        if self.shared.handler.read().is_some() && self.shared.connectivity.is_connected() {
            let queue = self.clone();
            tokio::spawn(async move {
                queue.drain().await;
            });
        }
        id
    }

    /// Removes a request by id. Returns true if it was queued.
    pub async fn remove_request(&self, id: &str) -> bool {
        let removed = {
            let mut entries = self.shared.entries.lock();
            let before = entries.len();
            entries.retain(|e| e.id != id);
            entries.len() != before
        };
        if removed {
            self.persist().await;
        }
        removed
    }

    /// Returns a snapshot of the queued requests in insertion order.
    pub fn requests(&self) -> Vec<QueuedRequest> {
        self.shared.entries.lock().clone()
    }

    /// Returns the number of queued requests.
    pub fn len(&self) -> usize {
        self.shared.entries.lock().len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.shared.entries.lock().is_empty()
    }

    /// Removes every request.
    pub async fn clear(&self) {
        self.shared.entries.lock().clear();
        self.persist().await;
    }

    /// Returns a summary of the queue.
    pub fn stats(&self) -> QueueStats {
        let entries = self.shared.entries.lock();
        QueueStats {
            size: entries.len(),
            oldest_created_at: entries.iter().map(|e| e.created_at).min(),
            highest_priority: entries.iter().map(|e| e.priority).max(),
            pending_attempts: entries.iter().map(|e| e.attempts).sum(),
        }
    }

    /// Returns true while a drain pass is running.
    pub fn is_draining(&self) -> bool {
        self.shared.draining.load(Ordering::Acquire)
    }

    /// Stops watching connectivity. Safe to call more than once.
    pub fn destroy(&self) {
        if let Some(watcher) = self.shared.watcher.lock().take() {
            watcher.abort();
            debug!("offline queue destroyed");
        }
    }

    /// Gives every queued request one attempt, in drain order.
    ///
    /// Does nothing if the queue is not initialized, already draining,
    /// offline or empty. Stops early if connectivity is lost; the watcher
    /// then resumes on the next online state it observes, even if the
    /// offline interval was too short for it to see.
    pub async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();
        loop {
            let pass = self.drain_pass().await;
            report.absorb(pass);
            if !pass.stopped_offline {
                return report;
            }
            self.shared.needs_drain.store(true, Ordering::Release);
            // Connectivity may have returned before the guard was released,
            // in which case the watcher's own drain found it held.
            if !self.shared.connectivity.is_connected() {
                return report;
            }
        }
    }

    async fn drain_pass(&self) -> DrainReport {
        let mut report = DrainReport::default();

        let Some(handler) = self.shared.handler.read().clone() else {
            return report;
        };
        let Some(_guard) = DrainGuard::acquire(&self.shared.draining) else {
            debug!("drain already running");
            return report;
        };
        if !self.shared.connectivity.is_connected() {
            return report;
        }
        self.shared.needs_drain.store(false, Ordering::Release);

        let mut snapshot = self.requests();
        if snapshot.is_empty() {
            return report;
        }
        snapshot.sort_by(QueuedRequest::drain_order);
        debug!(size = snapshot.len(), "draining offline queue");

        for queued in snapshot {
            if !self.shared.connectivity.is_connected() {
                info!("connectivity lost, pausing drain");
                report.stopped_offline = true;
                break;
            }

            let Some(request) = self.begin_attempt(&queued.id) else {
                continue;
            };
            report.attempted += 1;

            match handler.handle(&request).await {
                Ok(()) => {
                    self.remove_entry(&request.id);
                    report.succeeded += 1;
                    debug!(id = %request.id, "queued request succeeded");
                }
                Err(err) if request.attempts >= self.shared.config.max_attempts => {
                    self.remove_entry(&request.id);
                    report.dropped += 1;
                    self.shared.reporter.report(
                        &format!(
                            "dropping queued request after {} attempts: {err}",
                            request.attempts
                        ),
                        &ReportContext::new("offline_queue")
                            .with_kind(err.kind)
                            .with_attempts(request.attempts)
                            .with_request(request.descriptor()),
                    );
                }
                Err(err) => {
                    report.requeued += 1;
                    debug!(id = %request.id, attempts = request.attempts, error = %err, "queued request failed, keeping");
                }
            }
            self.persist().await;
        }

        debug!(?report, "drain finished");
        report
    }

    /// Bumps the attempt counter of a still-queued request and returns a
    /// copy of it.
    fn begin_attempt(&self, id: &str) -> Option<QueuedRequest> {
        let now = self.shared.clock.now();
        let mut entries = self.shared.entries.lock();
        let entry = entries.iter_mut().find(|e| e.id == id)?;
        entry.attempts += 1;
        entry.last_attempt_at = Some(now);
        Some(entry.clone())
    }

    fn remove_entry(&self, id: &str) {
        self.shared.entries.lock().retain(|e| e.id != id);
    }
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("config", &self.shared.config)
            .field("size", &self.len())
            .field("draining", &self.is_draining())
            .finish()
    }
}

/// Drains on every offline-to-online transition until the queue is
/// dropped or destroyed.
///
/// `watch` coalesces updates, so a short offline interval may never be
/// observed here. Any online state seen while `needs_drain` is set counts
/// as a transition.
fn spawn_watcher(
    shared: Weak<Shared>,
    mut changes: tokio::sync::watch::Receiver<bool>,
    mut online: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now_online = *changes.borrow_and_update();
            let came_online = now_online && !online;
            online = now_online;
            if now_online {
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                if came_online || shared.needs_drain.load(Ordering::Acquire) {
                    info!("back online, draining offline queue");
                    OfflineQueue { shared }.drain().await;
                }
            }
            if changes.changed().await.is_err() {
                break;
            }
        }
    })
}
