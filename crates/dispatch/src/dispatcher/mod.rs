//! The dispatcher: a bounded-concurrency runner for [`Unit`](crate::Unit)s.
//!
//! Split into focused submodules:
//! - `core`: Dispatcher handle, builder, and accessor methods
//! - `queue`: Unit backlog and the push/close API
//! - `execution`: Run start, refill loop, and completion aggregation

mod core;
mod execution;
mod queue;

pub use self::core::{Dispatcher, DispatcherBuilder};
