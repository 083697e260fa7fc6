//! Sync engine state machine.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::local::{LocalStore, LocalTransaction};
use crate::metadata::SyncMetadata;
use crate::remote::RemoteSource;
use parking_lot::RwLock;
use std::sync::Arc;
use tether_protocol::{
    ChangeSet, Clock, Conflict, PullRequest, PushRequest, Resolution, SystemClock,
    Timestamp,
};
use tether_storage::KeyValueStore;
use tracing::{debug, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No sync has run yet.
    Idle,
    /// Fetching remote changes.
    Pulling,
    /// Applying remote changes to the local store.
    Applying,
    /// Sending local changes.
    Pushing,
    /// The last sync completed.
    Synced,
    /// The last sync failed.
    Error,
}

impl SyncState {
    /// Returns true while a sync is running.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::Pulling | SyncState::Applying | SyncState::Pushing
        )
    }
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Sync operations that completed.
    pub cycles_completed: u64,
    /// Sync operations that failed.
    pub cycles_failed: u64,
    /// Remote records applied or compared.
    pub records_pulled: u64,
    /// Local changes pushed.
    pub records_pushed: u64,
    /// Timestamp comparisons between a local and a remote version.
    pub conflicts: u64,
    /// Last error message, cleared by the next success.
    pub last_error: Option<String>,
}

/// What one sync operation did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Remote records inserted fresh.
    pub created: usize,
    /// Local records replaced by a newer remote version.
    pub updated: usize,
    /// Local records tombstoned by remote deletions.
    pub deleted: usize,
    /// Remote updates for records that do not exist locally.
    pub ignored_updates: usize,
    /// Local changes pushed.
    pub pushed: usize,
    /// Every local/remote timestamp comparison made while applying.
    pub conflicts: Vec<Conflict>,
    /// The cursor after the sync.
    pub cursor: Timestamp,
}

impl SyncReport {
    /// Comparisons the local version won.
    pub fn kept_local(&self) -> usize {
        self.conflicts
            .iter()
            .filter(|c| c.resolution == Resolution::KeepLocal)
            .count()
    }

    /// Comparisons the remote version won.
    pub fn accepted_remote(&self) -> usize {
        self.conflicts
            .iter()
            .filter(|c| c.resolution == Resolution::AcceptRemote)
            .count()
    }
}

/// Builder for [`SyncEngine`].
pub struct SyncEngineBuilder<L: LocalStore, R: RemoteSource> {
    local: Arc<L>,
    remote: Arc<R>,
    store: Arc<dyn KeyValueStore>,
    config: SyncConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl<L: LocalStore, R: RemoteSource> SyncEngineBuilder<L, R> {
    /// Sets the configuration.
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the clock used for the sync schedule.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Restores persisted metadata and builds the engine.
    ///
    /// Unreadable metadata is logged and treated as absent, which makes
    /// the next sync a full one.
    pub async fn open(self) -> SyncEngine<L, R> {
        let metadata = match SyncMetadata::load(self.store.as_ref(), &self.config).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(error = %e, "failed to load sync metadata, starting fresh");
                SyncMetadata::default()
            }
        };
        debug!(?metadata, "sync engine opened");

        SyncEngine {
            config: self.config,
            local: self.local,
            remote: self.remote,
            store: self.store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            metadata: RwLock::new(metadata),
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            serial: tokio::sync::Mutex::new(()),
        }
    }
}

/// Keeps a [`LocalStore`] consistent with a [`RemoteSource`].
///
/// A sync pulls remote changes since the cursor, applies them in one local
/// transaction with last-write-wins on `updated_at` (ties keep the local
/// version), pushes pending local changes, then advances the cursor. The
/// cursor only moves when every phase succeeded, so a failed sync can be
/// retried from scratch. Sync operations on one engine run one at a time.
pub struct SyncEngine<L: LocalStore, R: RemoteSource> {
    config: SyncConfig,
    local: Arc<L>,
    remote: Arc<R>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    metadata: RwLock<SyncMetadata>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    serial: tokio::sync::Mutex<()>,
}

impl<L: LocalStore, R: RemoteSource> SyncEngine<L, R> {
    /// Starts a builder. `store` holds the cursor and the last sync time.
    pub fn builder(
        local: Arc<L>,
        remote: Arc<R>,
        store: Arc<dyn KeyValueStore>,
    ) -> SyncEngineBuilder<L, R> {
        SyncEngineBuilder {
            local,
            remote,
            store,
            config: SyncConfig::default(),
            clock: None,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the local store.
    pub fn local(&self) -> &Arc<L> {
        &self.local
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the pull cursor.
    pub fn last_pulled_at(&self) -> Option<Timestamp> {
        self.metadata.read().last_pulled_at
    }

    /// Returns the time of the last successful sync.
    pub fn last_synced_at(&self) -> Option<Timestamp> {
        self.metadata.read().last_synced_at
    }

    /// Returns true if more than the configured interval has passed since
    /// the last successful sync, or if there was none.
    pub fn is_sync_due(&self) -> bool {
        self.metadata
            .read()
            .is_due(self.clock.now(), self.config.sync_interval)
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Pulls, applies and pushes.
    pub async fn synchronize(&self) -> SyncResult<SyncReport> {
        let _serial = self.serial.lock().await;
        let cursor = self.last_pulled_at();
        info!(?cursor, "synchronizing");
        let result = self
            .run(PullRequest::incremental(cursor, self.config.schema_version), true)
            .await;
        self.finish(result).await
    }

    /// Pulls everything and applies it without pushing.
    ///
    /// Used to rebuild a wiped local store. Conflicts resolve exactly as in
    /// [`SyncEngine::synchronize`].
    pub async fn pull_changes(&self) -> SyncResult<SyncReport> {
        let _serial = self.serial.lock().await;
        info!("pulling full remote state");
        let result = self
            .run(PullRequest::full(self.config.schema_version), false)
            .await;
        self.finish(result).await
    }

    async fn run(&self, request: PullRequest, push: bool) -> SyncResult<SyncReport> {
        self.set_state(SyncState::Pulling);
        let response = self.remote.pull(&request).await?;
        debug!(
            records = response.changes.record_count(),
            timestamp = %response.timestamp,
            "pulled changes"
        );

        self.set_state(SyncState::Applying);
        let mut report = self
            .local
            .transaction(|txn| Ok(apply_changes(txn, &response.changes)))?;
        report.cursor = response.timestamp;

        if push {
            self.set_state(SyncState::Pushing);
            let changes = self.local.local_changes()?;
            if !changes.is_empty() {
                let pushed = self
                    .remote
                    .push(&PushRequest::new(changes.clone(), Some(response.timestamp)))
                    .await?;
                if !pushed.success {
                    return Err(SyncError::Rejected(
                        pushed.error.unwrap_or_else(|| "push rejected".into()),
                    ));
                }
                self.local.mark_synced(&changes)?;
                report.pushed = changes.record_count();
                debug!(records = report.pushed, "pushed changes");
            }
        }
        Ok(report)
    }

    async fn finish(&self, result: SyncResult<SyncReport>) -> SyncResult<SyncReport> {
        match result {
            Ok(report) => {
                let metadata = {
                    let mut metadata = self.metadata.write();
                    metadata.last_pulled_at = Some(report.cursor);
                    metadata.last_synced_at = Some(self.clock.now());
                    *metadata
                };
                if let Err(e) = metadata.save(self.store.as_ref(), &self.config).await {
                    warn!(error = %e, "failed to persist sync metadata");
                }
                match self.local.purge_tombstones() {
                    Ok(0) => {}
                    Ok(purged) => debug!(purged, "purged settled tombstones"),
                    Err(e) => warn!(error = %e, "failed to purge tombstones"),
                }

                {
                    let mut stats = self.stats.write();
                    stats.cycles_completed += 1;
                    stats.records_pulled += (report.created
                        + report.deleted
                        + report.ignored_updates
                        + report.conflicts.len()) as u64;
                    stats.records_pushed += report.pushed as u64;
                    stats.conflicts += report.conflicts.len() as u64;
                    stats.last_error = None;
                }
                self.set_state(SyncState::Synced);
                info!(
                    created = report.created,
                    updated = report.updated,
                    deleted = report.deleted,
                    kept_local = report.kept_local(),
                    pushed = report.pushed,
                    cursor = %report.cursor,
                    "sync completed"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "sync failed");
                {
                    let mut stats = self.stats.write();
                    stats.cycles_failed += 1;
                    stats.last_error = Some(e.to_string());
                }
                self.set_state(SyncState::Error);
                Err(e)
            }
        }
    }
}

/// Applies remote changes with last-write-wins.
fn apply_changes(txn: &mut dyn LocalTransaction, changes: &ChangeSet) -> SyncReport {
    let mut report = SyncReport::default();

    for (table, remote) in changes.tables() {
        for record in &remote.created {
            match txn.get(table, &record.id) {
                Some(local) => {
                    let conflict = Conflict::between(table, &local.record, record);
                    if conflict.resolution == Resolution::AcceptRemote {
                        txn.apply_remote(table, record.clone());
                        report.updated += 1;
                    }
                    report.conflicts.push(conflict);
                }
                None => {
                    txn.apply_remote(table, record.clone());
                    report.created += 1;
                }
            }
        }

        for record in &remote.updated {
            let Some(local) = txn.get(table, &record.id) else {
                warn!(table, id = %record.id, "ignoring update for unknown record");
                report.ignored_updates += 1;
                continue;
            };
            let conflict = Conflict::between(table, &local.record, record);
            if conflict.resolution == Resolution::AcceptRemote {
                txn.apply_remote(table, record.clone());
                report.updated += 1;
            }
            report.conflicts.push(conflict);
        }

        for id in &remote.deleted {
            if txn.tombstone(table, id) {
                report.deleted += 1;
            }
        }
    }
    report
}

impl<L: LocalStore, R: RemoteSource> std::fmt::Debug for SyncEngine<L, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("metadata", &*self.metadata.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::{MemoryLocalStore, SyncStatus};
    use crate::remote::MockRemote;
    use tether_net::{ErrorKind, NetError};
    use tether_protocol::{PullResponse, PushResponse, Record};
    use tether_storage::InMemoryStore;

    fn note(id: &str, at: i64, title: &str) -> Record {
        Record::new(id, Timestamp::from_millis(at)).with_field("title", title)
    }

    fn pull(at: i64, f: impl FnOnce(&mut ChangeSet)) -> PullResponse {
        let mut changes = ChangeSet::new();
        f(&mut changes);
        PullResponse::new(changes, Timestamp::from_millis(at))
    }

    async fn engine() -> SyncEngine<MemoryLocalStore, MockRemote> {
        SyncEngine::builder(
            Arc::new(MemoryLocalStore::new()),
            Arc::new(MockRemote::new()),
            Arc::new(InMemoryStore::new()),
        )
        .open()
        .await
    }

    #[test]
    fn sync_state_checks() {
        assert!(SyncState::Pulling.is_active());
        assert!(SyncState::Applying.is_active());
        assert!(!SyncState::Idle.is_active());
        assert!(!SyncState::Error.is_active());
    }

    #[tokio::test]
    async fn initial_state() {
        let engine = engine().await;
        assert_eq!(engine.state(), SyncState::Idle);
        assert_eq!(engine.last_pulled_at(), None);
        assert!(engine.is_sync_due());
        assert_eq!(engine.stats(), SyncStats::default());
    }

    #[tokio::test]
    async fn inserts_remote_records_and_advances_cursor() {
        let engine = engine().await;
        engine.remote.push_pull_response(pull(100, |c| {
            c.table_mut("notes").created.push(note("a", 10, "remote"));
        }));

        let report = engine.synchronize().await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.cursor, Timestamp::from_millis(100));
        assert_eq!(engine.last_pulled_at(), Some(Timestamp::from_millis(100)));
        assert_eq!(engine.state(), SyncState::Synced);
        assert!(!engine.is_sync_due());
        assert_eq!(engine.local.records("notes").len(), 1);

        engine.synchronize().await.unwrap();
        let pulls = engine.remote.pull_requests();
        assert_eq!(pulls[1].last_pulled_at, Some(Timestamp::from_millis(100)));
    }

    #[tokio::test]
    async fn remote_update_wins_only_when_newer() {
        let engine = engine().await;
        engine
            .local
            .transaction(|txn| {
                txn.apply_remote("notes", note("older", 10, "local"));
                txn.apply_remote("notes", note("tie", 10, "local"));
                txn.apply_remote("notes", note("newer", 10, "local"));
                Ok(())
            })
            .unwrap();
        engine.remote.push_pull_response(pull(100, |c| {
            let notes = c.table_mut("notes");
            notes.updated.push(note("older", 5, "remote"));
            notes.updated.push(note("tie", 10, "remote"));
            notes.updated.push(note("newer", 11, "remote"));
            notes.updated.push(note("ghost", 11, "remote"));
        }));

        let report = engine.synchronize().await.unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.kept_local(), 2);
        assert_eq!(report.ignored_updates, 1);

        let title = |id: &str| {
            engine.local.get("notes", id).unwrap().unwrap().record.field("title").cloned()
        };
        assert_eq!(title("older"), Some("local".into()));
        assert_eq!(title("tie"), Some("local".into()));
        assert_eq!(title("newer"), Some("remote".into()));
        assert!(engine.local.get("notes", "ghost").unwrap().is_none());
    }

    #[tokio::test]
    async fn remote_create_conflicts_with_offline_create() {
        let engine = engine().await;
        engine
            .local
            .transaction(|txn| {
                txn.create("notes", note("a", 50, "offline"));
                Ok(())
            })
            .unwrap();
        engine.remote.push_pull_response(pull(100, |c| {
            c.table_mut("notes").created.push(note("a", 40, "remote"));
        }));

        let report = engine.synchronize().await.unwrap();
        assert_eq!(report.kept_local(), 1);
        assert_eq!(report.pushed, 1);
        let pushes = engine.remote.push_requests();
        assert_eq!(pushes[0].last_pulled_at, Some(Timestamp::from_millis(100)));
        assert_eq!(pushes[0].changes.table("notes").unwrap().created[0].id, "a");
        assert!(engine.local.local_changes().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remote_deletes_are_purged_after_commit() {
        let engine = engine().await;
        engine
            .local
            .transaction(|txn| {
                txn.apply_remote("notes", note("a", 1, "x"));
                Ok(())
            })
            .unwrap();
        engine.remote.push_pull_response(pull(100, |c| {
            let notes = c.table_mut("notes");
            notes.deleted.push("a".into());
            notes.deleted.push("never-existed".into());
        }));

        let report = engine.synchronize().await.unwrap();
        assert_eq!(report.deleted, 1);
        assert!(engine.local.get("notes", "a").unwrap().is_none());
        assert!(engine.local.is_empty());
    }

    #[tokio::test]
    async fn pending_deletion_beats_older_remote_update() {
        let engine = engine().await;
        engine
            .local
            .transaction(|txn| {
                txn.apply_remote("notes", note("stale", 10, "x"));
                txn.apply_remote("notes", note("revived", 10, "y"));
                assert!(txn.mark_deleted("notes", "stale", Timestamp::from_millis(80)));
                assert!(txn.mark_deleted("notes", "revived", Timestamp::from_millis(80)));
                Ok(())
            })
            .unwrap();
        engine.remote.push_pull_response(pull(100, |c| {
            let notes = c.table_mut("notes");
            notes.updated.push(note("stale", 50, "edited before the delete"));
            notes.updated.push(note("revived", 90, "edited after the delete"));
        }));

        let report = engine.synchronize().await.unwrap();
        assert_eq!(report.kept_local(), 1);
        assert_eq!(report.updated, 1);

        let pushes = engine.remote.push_requests();
        assert_eq!(pushes[0].changes.table("notes").unwrap().deleted, vec!["stale".to_string()]);
        assert!(engine.local.get("notes", "stale").unwrap().is_none());

        let revived = engine.local.get("notes", "revived").unwrap().unwrap();
        assert!(!revived.deleted);
        assert_eq!(revived.status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn failed_push_keeps_cursor() {
        let engine = engine().await;
        engine
            .local
            .transaction(|txn| {
                txn.create("notes", note("a", 1, "x"));
                Ok(())
            })
            .unwrap();
        engine.remote.push_pull_response(pull(100, |_| {}));
        engine
            .remote
            .push_push_response(PushResponse::error("stale cursor"));

        let err = engine.synchronize().await.unwrap_err();
        assert!(matches!(err, SyncError::Rejected(ref m) if m == "stale cursor"));
        assert_eq!(engine.state(), SyncState::Error);
        assert_eq!(engine.last_pulled_at(), None);
        assert_eq!(engine.stats().cycles_failed, 1);
        assert!(engine.is_sync_due());
        assert_eq!(engine.local.local_changes().unwrap().record_count(), 1);
    }

    #[tokio::test]
    async fn failed_pull_reports_error() {
        let engine = engine().await;
        engine
            .remote
            .fail_next_pull(NetError::new(ErrorKind::NetworkError, true, "offline").into());

        let err = engine.synchronize().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            engine.stats().last_error.as_deref(),
            Some("remote error: NETWORK_ERROR: offline")
        );

        engine.synchronize().await.unwrap();
        assert_eq!(engine.stats().last_error, None);
    }

    #[tokio::test]
    async fn pull_changes_is_full_and_never_pushes() {
        let engine = engine().await;
        engine
            .local
            .transaction(|txn| {
                txn.create("notes", note("local", 1, "x"));
                Ok(())
            })
            .unwrap();
        engine.remote.push_pull_response(pull(100, |c| {
            c.table_mut("notes").created.push(note("a", 1, "r"));
        }));
        engine.synchronize().await.unwrap();

        engine.remote.push_pull_response(pull(200, |c| {
            c.table_mut("notes").created.push(note("b", 1, "r"));
        }));
        engine
            .local
            .transaction(|txn| {
                txn.create("notes", note("pending", 1, "x"));
                Ok(())
            })
            .unwrap();
        let report = engine.pull_changes().await.unwrap();

        assert_eq!(report.pushed, 0);
        assert_eq!(report.created, 1);
        assert!(engine.remote.pull_requests()[1].is_full());
        assert_eq!(engine.remote.push_requests().len(), 1);
        assert_eq!(engine.last_pulled_at(), Some(Timestamp::from_millis(200)));
    }

    #[tokio::test]
    async fn cursor_survives_reopen() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let remote = Arc::new(MockRemote::new());
        remote.push_pull_response(pull(100, |_| {}));

        let first = SyncEngine::builder(Arc::new(MemoryLocalStore::new()), remote.clone(), store.clone())
            .open()
            .await;
        first.synchronize().await.unwrap();

        let second = SyncEngine::builder(Arc::new(MemoryLocalStore::new()), remote, store)
            .open()
            .await;
        assert_eq!(second.last_pulled_at(), Some(Timestamp::from_millis(100)));
        assert!(second.last_synced_at().is_some());
    }
}
