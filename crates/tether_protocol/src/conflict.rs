//! Last-write-wins conflict resolution.
//!
//! A conflict exists whenever a record id is present both locally and in a
//! remote change. The copy with the strictly greater `updated_at` wins; on
//! an exact tie the local copy is kept. Timestamps are wall-clock values
//! from different devices, so clock skew can pick the "wrong" winner. No
//! vector clocks or server sequence numbers are involved.

use crate::changes::Record;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Outcome of resolving a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Keep the local version unmodified.
    KeepLocal,
    /// Overwrite the local version with the remote one.
    AcceptRemote,
}

/// Resolves a conflict by comparing modification times.
///
/// Remote wins only when strictly newer.
pub fn resolve(local_updated_at: Timestamp, remote_updated_at: Timestamp) -> Resolution {
    if remote_updated_at > local_updated_at {
        Resolution::AcceptRemote
    } else {
        Resolution::KeepLocal
    }
}

/// A resolved conflict, reported back to the caller of a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Table name.
    pub table: String,
    /// Record id.
    pub id: String,
    /// Local modification time.
    pub local_updated_at: Timestamp,
    /// Remote modification time.
    pub remote_updated_at: Timestamp,
    /// Chosen side.
    pub resolution: Resolution,
}

impl Conflict {
    /// Resolves a conflict between a local and a remote copy of one record.
    pub fn between(table: &str, local: &Record, remote: &Record) -> Self {
        Self {
            table: table.to_string(),
            id: remote.id.clone(),
            local_updated_at: local.updated_at,
            remote_updated_at: remote.updated_at,
            resolution: resolve(local.updated_at, remote.updated_at),
        }
    }
}
