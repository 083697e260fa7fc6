//! Collapsing of concurrent identical calls.

use crate::config::DedupConfig;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tether_protocol::HttpMethod;
use tracing::trace;

/// Builds the deduplication key of a call from its method, URL, query
/// parameters and body.
pub fn cache_key(
    method: HttpMethod,
    url: &str,
    query: &[(String, String)],
    body: Option<&str>,
) -> String {
    format!("{method} {url} {query:?} {body:?}")
}

type SharedCall<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct Entry<T, E> {
    generation: u64,
    call: SharedCall<T, E>,
}

type EntryMap<T, E> = Arc<Mutex<HashMap<String, Entry<T, E>>>>;

/// Shares one execution among callers that ask for the same key while it
/// is in flight or recently settled.
///
/// Every caller of a shared execution observes the same `Ok` or the same
/// `Err`. An entry is evicted `settle_window` after its execution settles,
/// after which the key executes fresh. Must be used within a Tokio
/// runtime, since eviction runs on a spawned task.
pub struct Deduplicator<T, E> {
    config: DedupConfig,
    entries: EntryMap<T, E>,
    next_generation: AtomicU64,
}

impl<T, E> Deduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Creates an empty deduplicator.
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Runs the call produced by `make` under `key`, or joins the one
    /// already registered under it.
    ///
    /// `make` is only invoked when no entry exists for `key`.
    pub async fn run<F, Fut>(&self, key: String, make: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let call = {
            let mut entries = self.entries.lock();
            match entries.get(&key) {
                Some(entry) => {
                    trace!(%key, "joining in-flight call");
                    entry.call.clone()
                }
                None => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let call = make().boxed().shared();
                    entries.insert(
                        key.clone(),
                        Entry {
                            generation,
                            call: call.clone(),
                        },
                    );
                    self.schedule_eviction(key, generation, call.clone());
                    call
                }
            }
        };
        call.await
    }

    /// Returns the number of keys currently shared.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no key is currently shared.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drops every entry. In-flight executions keep running for the
    /// callers already awaiting them.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn schedule_eviction(&self, key: String, generation: u64, call: SharedCall<T, E>) {
        let entries = Arc::clone(&self.entries);
        let settle_window = self.config.settle_window;
        tokio::spawn(async move {
            let _ = call.await;
            tokio::time::sleep(settle_window).await;
            let mut entries = entries.lock();
            if entries
                .get(&key)
                .is_some_and(|entry| entry.generation == generation)
            {
                entries.remove(&key);
                trace!(%key, "evicted settled call");
            }
        });
    }
}

impl<T, E> std::fmt::Debug for Deduplicator<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator")
            .field("config", &self.config)
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}
