//! # Tether Testkit
//!
//! Test utilities for tether.
//!
//! This crate provides:
//! - A manually driven clock
//! - A scripted transport and a recording error reporter
//! - A key-value store wrapper with injectable failures
//! - A recording queue handler with scripted failures
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tether_testkit::prelude::*;
//!
//! let transport = Arc::new(ScriptedTransport::new());
//! transport.push_response(NetResponse::new(503, ""));
//! let interceptor = NetworkInterceptor::builder(transport.clone()).build();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod generators;
pub mod handler;
pub mod reporter;
pub mod store;
pub mod transport;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::*;
    pub use crate::generators::*;
    pub use crate::handler::*;
    pub use crate::reporter::*;
    pub use crate::store::*;
    pub use crate::transport::*;
}

pub use clock::*;
pub use generators::*;
pub use handler::*;
pub use reporter::*;
pub use store::*;
pub use transport::*;
