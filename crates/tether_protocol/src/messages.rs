//! Pull and push messages exchanged with the remote source of truth.

use crate::changes::ChangeSet;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Request for remote changes since a cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Cursor; `None` requests a full pull.
    pub last_pulled_at: Option<Timestamp>,
    /// Local schema version, so the remote can refuse or adapt.
    pub schema_version: u32,
}

impl PullRequest {
    /// Creates an incremental pull from `cursor`.
    pub fn incremental(cursor: Option<Timestamp>, schema_version: u32) -> Self {
        Self {
            last_pulled_at: cursor,
            schema_version,
        }
    }

    /// Creates a full pull that ignores any local cursor.
    pub fn full(schema_version: u32) -> Self {
        Self {
            last_pulled_at: None,
            schema_version,
        }
    }

    /// Returns true if this is a full pull.
    pub fn is_full(&self) -> bool {
        self.last_pulled_at.is_none()
    }
}

/// Remote changes plus the server time they are current as of.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    /// Changes grouped by table.
    #[serde(default)]
    pub changes: ChangeSet,
    /// Server timestamp; becomes the next cursor once sync succeeds.
    pub timestamp: Timestamp,
}

impl PullResponse {
    /// Creates a pull response.
    pub fn new(changes: ChangeSet, timestamp: Timestamp) -> Self {
        Self { changes, timestamp }
    }
}

/// Local changes sent to the remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    /// Local changes grouped by table.
    pub changes: ChangeSet,
    /// Cursor the changes were computed against, so the remote can
    /// detect a stale client.
    pub last_pulled_at: Option<Timestamp>,
}

impl PushRequest {
    /// Creates a push request.
    pub fn new(changes: ChangeSet, last_pulled_at: Option<Timestamp>) -> Self {
        Self {
            changes,
            last_pulled_at,
        }
    }
}

/// Outcome of a push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    /// Whether the remote accepted the changes.
    pub success: bool,
    /// Rejection reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PushResponse {
    /// An accepted push.
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// A rejected push.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}
