//! Records and change-sets exchanged during sync.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A single row of a synced table.
///
/// Only `id` and `updated_at` are interpreted; every other column travels
/// in `fields` untouched. `updated_at` is accepted as `updatedAt` too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Primary key, unique within its table.
    pub id: String,
    /// Last modification time, used for conflict resolution.
    #[serde(alias = "updatedAt")]
    pub updated_at: Timestamp,
    /// Remaining columns.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates a record with no extra columns.
    pub fn new(id: impl Into<String>, updated_at: Timestamp) -> Self {
        Self {
            id: id.into(),
            updated_at,
            fields: Map::new(),
        }
    }

    /// Sets a column.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Reads a column.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Changes to one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableChanges {
    /// Records created since the cursor.
    #[serde(default)]
    pub created: Vec<Record>,
    /// Records updated since the cursor.
    #[serde(default)]
    pub updated: Vec<Record>,
    /// Ids of records deleted since the cursor.
    #[serde(default)]
    pub deleted: Vec<String>,
}

impl TableChanges {
    /// Returns true if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Total number of created, updated and deleted entries.
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

/// Changes grouped by table name.
///
/// Tables are kept in name order so that applying a change-set is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    tables: BTreeMap<String, TableChanges>,
}

impl ChangeSet {
    /// Creates an empty change-set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the changes for `table`, creating an empty entry if needed.
    pub fn table_mut(&mut self, table: &str) -> &mut TableChanges {
        self.tables.entry(table.to_string()).or_default()
    }

    /// Returns the changes for `table`, if any.
    pub fn table(&self, table: &str) -> Option<&TableChanges> {
        self.tables.get(table)
    }

    /// Iterates over tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &TableChanges)> {
        self.tables.iter().map(|(name, changes)| (name.as_str(), changes))
    }

    /// Returns true if no table has any change.
    pub fn is_empty(&self) -> bool {
        self.tables.values().all(TableChanges::is_empty)
    }

    /// Total number of entries across all tables.
    pub fn record_count(&self) -> usize {
        self.tables.values().map(TableChanges::len).sum()
    }

    /// Drops tables that carry no changes.
    pub fn prune(&mut self) {
        self.tables.retain(|_, changes| !changes.is_empty());
    }
}
