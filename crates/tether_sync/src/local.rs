//! The local side of synchronization.

use crate::error::SyncResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tether_protocol::{ChangeSet, Record, Timestamp};

/// Sync status of a local record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// Matches the remote as of the last sync.
    Synced,
    /// Authored locally, never pushed.
    Created,
    /// Changed locally since the last push.
    Updated,
    /// Deleted locally, deletion not pushed yet.
    Deleted,
}

/// A record as held by the local store.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRecord {
    /// The record itself.
    pub record: Record,
    /// Pending local change, if any.
    pub status: SyncStatus,
    /// Tombstone flag; deleted records stay until the deletion is settled.
    pub deleted: bool,
}

impl LocalRecord {
    /// Wraps a record received from the remote.
    pub fn synced(record: Record) -> Self {
        Self {
            record,
            status: SyncStatus::Synced,
            deleted: false,
        }
    }
}

/// Mutations available inside a local transaction.
///
/// The `apply_*` and `tombstone` calls are used by the sync engine to apply
/// remote changes and leave records `Synced`. `create`, `update` and
/// `mark_deleted` are the authoring API and record a pending change.
pub trait LocalTransaction {
    /// Returns a record by table and id.
    fn get(&self, table: &str, id: &str) -> Option<LocalRecord>;

    /// Inserts or replaces a record with the remote version.
    fn apply_remote(&mut self, table: &str, record: Record);

    /// Marks a record deleted by the remote. Returns false if absent.
    fn tombstone(&mut self, table: &str, id: &str) -> bool;

    /// Authors a new record.
    fn create(&mut self, table: &str, record: Record);

    /// Replaces a record's fields and `updated_at`. Returns false if absent.
    fn update(&mut self, table: &str, record: Record) -> bool;

    /// Deletes a record locally at time `at`. Returns false if absent.
    ///
    /// The deletion time becomes the record's `updated_at`, so it competes
    /// with remote updates like any other local edit.
    fn mark_deleted(&mut self, table: &str, id: &str, at: Timestamp) -> bool;
}

/// The embedded store kept in sync with the remote.
pub trait LocalStore: Send + Sync {
    /// Returns a record by table and id.
    fn get(&self, table: &str, id: &str) -> SyncResult<Option<LocalRecord>>;

    /// Runs `f` atomically: if it returns `Err`, none of its mutations
    /// are kept.
    fn transaction<T, F>(&self, f: F) -> SyncResult<T>
    where
        F: FnOnce(&mut dyn LocalTransaction) -> SyncResult<T>;

    /// Returns every pending local change, grouped by table.
    fn local_changes(&self) -> SyncResult<ChangeSet>;

    /// Settles changes the remote accepted.
    ///
    /// Pushed deletions are removed for good. Pushed creations and updates
    /// become `Synced` unless the record changed again since.
    fn mark_synced(&self, pushed: &ChangeSet) -> SyncResult<()>;

    /// Removes tombstones left by remote deletions. Returns how many.
    ///
    /// Pending local deletions are kept until they are pushed.
    fn purge_tombstones(&self) -> SyncResult<usize>;
}

type Tables = BTreeMap<String, BTreeMap<String, LocalRecord>>;

struct MemoryTransaction<'a> {
    tables: &'a mut Tables,
}

impl MemoryTransaction<'_> {
    fn slot(&mut self, table: &str, id: &str) -> Option<&mut LocalRecord> {
        self.tables.get_mut(table)?.get_mut(id)
    }

    fn put(&mut self, table: &str, record: LocalRecord) {
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(record.record.id.clone(), record);
    }
}

impl LocalTransaction for MemoryTransaction<'_> {
    fn get(&self, table: &str, id: &str) -> Option<LocalRecord> {
        self.tables.get(table)?.get(id).cloned()
    }

    fn apply_remote(&mut self, table: &str, record: Record) {
        self.put(table, LocalRecord::synced(record));
    }

    fn tombstone(&mut self, table: &str, id: &str) -> bool {
        match self.slot(table, id) {
            Some(local) => {
                local.deleted = true;
                local.status = SyncStatus::Synced;
                true
            }
            None => false,
        }
    }

    fn create(&mut self, table: &str, record: Record) {
        self.put(
            table,
            LocalRecord {
                record,
                status: SyncStatus::Created,
                deleted: false,
            },
        );
    }

    fn update(&mut self, table: &str, record: Record) -> bool {
        match self.slot(table, &record.id) {
            Some(local) => {
                if local.status != SyncStatus::Created {
                    local.status = SyncStatus::Updated;
                }
                local.record = record;
                true
            }
            None => false,
        }
    }

    fn mark_deleted(&mut self, table: &str, id: &str, at: Timestamp) -> bool {
        let Some(local) = self.slot(table, id) else {
            return false;
        };
        if local.status == SyncStatus::Created {
            // Never pushed, so the remote has nothing to delete.
            if let Some(rows) = self.tables.get_mut(table) {
                rows.remove(id);
            }
        } else {
            local.deleted = true;
            local.status = SyncStatus::Deleted;
            local.record.updated_at = local.record.updated_at.max(at);
        }
        true
    }
}

/// An in-memory [`LocalStore`].
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    tables: RwLock<Tables>,
}

impl MemoryLocalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live (non-deleted) records of a table.
    pub fn records(&self, table: &str) -> Vec<Record> {
        self.tables
            .read()
            .get(table)
            .map(|rows| {
                rows.values()
                    .filter(|r| !r.deleted)
                    .map(|r| r.record.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the number of records held, tombstones included.
    pub fn len(&self) -> usize {
        self.tables.read().values().map(BTreeMap::len).sum()
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, table: &str, id: &str) -> SyncResult<Option<LocalRecord>> {
        Ok(self
            .tables
            .read()
            .get(table)
            .and_then(|rows| rows.get(id))
            .cloned())
    }

    fn transaction<T, F>(&self, f: F) -> SyncResult<T>
    where
        F: FnOnce(&mut dyn LocalTransaction) -> SyncResult<T>,
    {
        let mut tables = self.tables.write();
        let mut working = (*tables).clone();
        let value = f(&mut MemoryTransaction {
            tables: &mut working,
        })?;
        *tables = working;
        Ok(value)
    }

    fn local_changes(&self) -> SyncResult<ChangeSet> {
        let tables = self.tables.read();
        let mut changes = ChangeSet::new();
        for (table, rows) in tables.iter() {
            for local in rows.values() {
                match local.status {
                    SyncStatus::Synced => {}
                    SyncStatus::Created => changes.table_mut(table).created.push(local.record.clone()),
                    SyncStatus::Updated => changes.table_mut(table).updated.push(local.record.clone()),
                    SyncStatus::Deleted => changes.table_mut(table).deleted.push(local.record.id.clone()),
                }
            }
        }
        Ok(changes)
    }

    fn mark_synced(&self, pushed: &ChangeSet) -> SyncResult<()> {
        let mut tables = self.tables.write();
        for (table, changes) in pushed.tables() {
            let Some(rows) = tables.get_mut(table) else {
                continue;
            };
            for record in changes.created.iter().chain(&changes.updated) {
                if let Some(local) = rows.get_mut(&record.id) {
                    let unchanged = local.record.updated_at == record.updated_at;
                    if unchanged && matches!(local.status, SyncStatus::Created | SyncStatus::Updated) {
                        local.status = SyncStatus::Synced;
                    }
                }
            }
            for id in &changes.deleted {
                if rows.get(id).is_some_and(|l| l.status == SyncStatus::Deleted) {
                    rows.remove(id);
                }
            }
        }
        Ok(())
    }

    fn purge_tombstones(&self) -> SyncResult<usize> {
        let mut tables = self.tables.write();
        let mut purged = 0;
        for rows in tables.values_mut() {
            let before = rows.len();
            rows.retain(|_, l| !(l.deleted && l.status == SyncStatus::Synced));
            purged += before - rows.len();
        }
        tables.retain(|_, rows| !rows.is_empty());
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    fn note(id: &str, at: i64, title: &str) -> Record {
        Record::new(id, Timestamp::from_millis(at)).with_field("title", title)
    }

    #[test]
    fn failed_transaction_keeps_nothing() {
        let store = MemoryLocalStore::new();
        let result: SyncResult<()> = store.transaction(|txn| {
            txn.create("notes", note("a", 1, "x"));
            Err(SyncError::local("constraint violated"))
        });
        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn authoring_tracks_changes() {
        let store = MemoryLocalStore::new();
        store
            .transaction(|txn| {
                txn.create("notes", note("a", 1, "x"));
                txn.apply_remote("notes", note("b", 1, "y"));
                txn.apply_remote("notes", note("c", 1, "z"));
                assert!(txn.update("notes", note("b", 2, "y2")));
                assert!(txn.mark_deleted("notes", "c", Timestamp::from_millis(3)));
                assert!(!txn.update("notes", note("missing", 1, "")));
                Ok(())
            })
            .unwrap();

        let changes = store.local_changes().unwrap();
        let notes = changes.table("notes").unwrap();
        assert_eq!(notes.created.len(), 1);
        assert_eq!(notes.updated[0].id, "b");
        assert_eq!(notes.deleted, vec!["c".to_string()]);
        assert_eq!(store.records("notes").len(), 2);
    }

    #[test]
    fn deleting_unpushed_record_removes_it() {
        let store = MemoryLocalStore::new();
        store
            .transaction(|txn| {
                txn.create("notes", note("a", 1, "x"));
                txn.update("notes", note("a", 2, "x2"));
                txn.mark_deleted("notes", "a", Timestamp::from_millis(3));
                Ok(())
            })
            .unwrap();
        assert!(store.is_empty());
        assert!(store.local_changes().unwrap().is_empty());
    }

    #[test]
    fn mark_synced_settles_pushed_changes() {
        let store = MemoryLocalStore::new();
        store
            .transaction(|txn| {
                txn.create("notes", note("a", 1, "x"));
                txn.apply_remote("notes", note("b", 1, "y"));
                txn.mark_deleted("notes", "b", Timestamp::from_millis(3));
                Ok(())
            })
            .unwrap();

        let pushed = store.local_changes().unwrap();
        // Edited again while the push was in flight.
        store
            .transaction(|txn| {
                txn.update("notes", note("a", 5, "newer"));
                Ok(())
            })
            .unwrap();
        store.mark_synced(&pushed).unwrap();

        assert_eq!(store.get("notes", "a").unwrap().unwrap().status, SyncStatus::Created);
        assert!(store.get("notes", "b").unwrap().is_none());
    }

    #[test]
    fn tombstone_keeps_record() {
        let store = MemoryLocalStore::new();
        store
            .transaction(|txn| {
                txn.apply_remote("notes", note("a", 1, "x"));
                assert!(txn.tombstone("notes", "a"));
                assert!(!txn.tombstone("notes", "missing"));
                Ok(())
            })
            .unwrap();
        let local = store.get("notes", "a").unwrap().unwrap();
        assert!(local.deleted);
        assert_eq!(local.status, SyncStatus::Synced);
        assert!(store.records("notes").is_empty());
    }

    #[test]
    fn local_deletion_is_stamped() {
        let store = MemoryLocalStore::new();
        store
            .transaction(|txn| {
                txn.apply_remote("notes", note("a", 10, "x"));
                txn.apply_remote("notes", note("b", 10, "y"));
                assert!(txn.mark_deleted("notes", "a", Timestamp::from_millis(90)));
                // A clock behind the last edit never moves it backwards.
                assert!(txn.mark_deleted("notes", "b", Timestamp::from_millis(5)));
                assert!(!txn.mark_deleted("notes", "missing", Timestamp::from_millis(90)));
                Ok(())
            })
            .unwrap();
        let updated_at = |id: &str| store.get("notes", id).unwrap().unwrap().record.updated_at;
        assert_eq!(updated_at("a"), Timestamp::from_millis(90));
        assert_eq!(updated_at("b"), Timestamp::from_millis(10));
    }

    #[test]
    fn purge_drops_only_settled_tombstones() {
        let store = MemoryLocalStore::new();
        store
            .transaction(|txn| {
                txn.apply_remote("notes", note("gone", 1, "x"));
                txn.apply_remote("notes", note("pending", 1, "y"));
                txn.apply_remote("tags", note("live", 1, "z"));
                txn.tombstone("notes", "gone");
                txn.mark_deleted("notes", "pending", Timestamp::from_millis(2));
                Ok(())
            })
            .unwrap();

        assert_eq!(store.purge_tombstones().unwrap(), 1);
        assert!(store.get("notes", "gone").unwrap().is_none());
        assert_eq!(store.get("notes", "pending").unwrap().unwrap().status, SyncStatus::Deleted);
        assert_eq!(store.len(), 2);
        assert_eq!(store.purge_tombstones().unwrap(), 0);
    }
}
