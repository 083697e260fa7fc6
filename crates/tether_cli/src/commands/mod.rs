//! CLI command implementations.

pub mod link;
pub mod queue;
pub mod sync;
