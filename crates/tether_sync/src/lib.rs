//! # Tether Sync
//!
//! Two-way synchronization between an embedded local store and a remote
//! source of truth.
//!
//! This crate provides:
//! - The sync state machine (idle → pulling → applying → pushing → synced)
//! - Last-write-wins reconciliation on `updated_at`
//! - Cursor and schedule persistence through a key-value store
//! - Local store and remote source abstractions, with in-memory and HTTP
//!   implementations
//!
//! ## Architecture
//!
//! A sync follows a **pull-then-push** model:
//! 1. Pull remote changes since the cursor
//! 2. Apply them in one local transaction; on equal timestamps the local
//!    version wins
//! 3. Push pending local changes
//! 4. Advance the cursor, only if every step succeeded
//!
//! Timestamps come from device and server wall clocks, so clock skew
//! between devices decides conflicts as much as edit order does.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod http;
mod local;
mod metadata;
mod remote;

pub use config::SyncConfig;
pub use engine::{SyncEngine, SyncEngineBuilder, SyncReport, SyncState, SyncStats};
pub use error::{SyncError, SyncResult};
pub use http::{HttpRemote, PULL_PATH, PUSH_PATH};
pub use local::{LocalRecord, LocalStore, LocalTransaction, MemoryLocalStore, SyncStatus};
pub use metadata::SyncMetadata;
pub use remote::{MockRemote, RemoteSource};
