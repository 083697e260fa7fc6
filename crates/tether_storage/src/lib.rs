//! # Tether Storage
//!
//! Persistent key-value storage for the tether offline-first layer.
//!
//! Every component that must survive a process restart (the offline queue,
//! the sync cursor, the last-sync timestamp) writes through the
//! [`KeyValueStore`] trait. Stores are **opaque string stores**: they do not
//! interpret the values they hold.
//!
//! ## Design Principles
//!
//! - Values are UTF-8 strings (callers serialize to JSON)
//! - All operations are async; a store may block on disk or a platform API
//! - Must be `Send + Sync` so one store can be shared across components
//! - Reading a missing key is not an error
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral state
//! - [`FileStore`] - One file per key with atomic replace
//! - [`EncryptedStore`] - Wrapper that seals values with AES-256-GCM
//!
//! ## Example
//!
//! ```rust
//! use tether_storage::{InMemoryStore, KeyValueStore, StorageResult};
//!
//! # async fn demo() -> StorageResult<()> {
//! let store = InMemoryStore::new();
//! store.set("greeting", "hello").await?;
//! assert_eq!(store.get("greeting").await?.as_deref(), Some("hello"));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod encrypted;
mod error;
mod file;
mod memory;
mod store;

pub use encrypted::{EncryptedStore, EncryptionKey, KEY_SIZE, NONCE_SIZE};
pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::KeyValueStore;
