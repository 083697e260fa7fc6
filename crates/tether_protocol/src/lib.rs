//! # Tether Protocol
//!
//! Shared data model for the tether offline-first layer.
//!
//! This crate provides:
//! - [`Timestamp`] and the [`Clock`] seam used for every time-dependent decision
//! - [`QueuedRequest`] and [`RequestDescriptor`] for the offline queue
//! - [`Record`], [`TableChanges`] and [`ChangeSet`] for sync deltas
//! - Pull/push messages exchanged with the remote source of truth
//! - Last-write-wins conflict resolution
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod changes;
mod conflict;
mod error;
mod messages;
mod request;
mod time;

pub use changes::{ChangeSet, Record, TableChanges};
pub use conflict::{resolve, Conflict, Resolution};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{PullRequest, PullResponse, PushRequest, PushResponse};
pub use request::{HttpMethod, QueuedRequest, RequestDescriptor};
pub use time::{Clock, SystemClock, Timestamp};
