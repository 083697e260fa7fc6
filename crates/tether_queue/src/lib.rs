//! # Tether Queue
//!
//! A persistent queue that keeps writes issued while offline and replays
//! them once connectivity returns.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tether_queue::{with_offline_queue, OfflineQueue};
//!
//! let queue = OfflineQueue::builder(store, connectivity).build();
//! queue.initialize(handler).await?;
//!
//! let descriptor = RequestDescriptor::new(HttpMethod::Post, "/notes").with_body(body);
//! let response = with_offline_queue(&queue, descriptor.clone(), interceptor.execute(request)).await;
//! ```
//!
//! ## Drain order
//!
//! Requests replay by priority (highest first), then by creation time.
//! Each drain pass gives every request one attempt; a drain triggered while
//! another is running does nothing, and a drain stops as soon as
//! connectivity is lost.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod handler;
mod helper;
mod queue;

pub use config::{QueueConfig, DEFAULT_STORAGE_KEY};
pub use error::{QueueError, QueueResult};
pub use handler::{InterceptorHandler, RequestHandler};
pub use helper::with_offline_queue;
pub use queue::{DrainReport, OfflineQueue, OfflineQueueBuilder, QueueStats};
pub use tether_net::IsNetworkFailure;
