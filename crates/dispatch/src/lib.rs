//! Bounded-concurrency unit dispatcher.
//!
//! A [`Dispatcher`] runs at most `limit` [`Unit`]s at once, accepts new units
//! while a run is in progress, and collects produced values in completion
//! order. The first failing unit terminates the run.
//!
//! ```ignore
//! let dispatcher = Dispatcher::new(2, vec![
//!     Unit::immediate(|| Ok::<_, std::io::Error>(1)),
//!     Unit::deferred(|| async { Ok::<_, std::io::Error>(2) }),
//! ])?;
//! let values = dispatcher.run().await?;
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod state;
pub mod unit;

pub use config::{CompletionMode, DispatcherConfig};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::{BoxError, DispatchError, UsageError};
pub use metrics::DispatchMetrics;
pub use state::Phase;
pub use unit::Unit;
