use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::config::{CompletionMode, DispatcherConfig};
use crate::error::DispatchError;
use crate::metrics::DispatchMetrics;
use crate::state::{Phase, RunState};
use crate::unit::Unit;

/// State shared between the dispatcher handle and its in-flight units.
pub(super) struct Shared<T> {
    pub(super) limit: usize,
    pub(super) completion: CompletionMode,
    state: Mutex<RunState<T>>,
}

impl<T> Shared<T> {
    /// Enter the run-state critical section.
    ///
    /// Every mutation leaves the state consistent before anything that can
    /// panic, so a poisoned lock is safe to recover.
    pub(super) fn lock(&self) -> MutexGuard<'_, RunState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs at most `limit` units at once and collects their values in
/// completion order.
///
/// The handle is cheap to clone; clones share the same backlog and run, so
/// units (or any other task) can push more work into a running dispatcher.
/// A dispatcher is single-use: it performs exactly one run, and pushes after
/// that run has finished are rejected.
pub struct Dispatcher<T> {
    pub(super) shared: Arc<Shared<T>>,
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Create a dispatcher with the given limit and initial backlog.
    ///
    /// The limit is kept as given even when it exceeds the initial backlog,
    /// so units pushed later can still use every slot.
    pub fn new(
        limit: usize,
        units: impl IntoIterator<Item = Unit<T>>,
    ) -> Result<Self, DispatchError> {
        Self::builder().limit(limit).units(units).build()
    }

    /// Create an empty dispatcher from a loaded config.
    pub fn with_config(config: &DispatcherConfig) -> Result<Self, DispatchError> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> DispatcherBuilder<T> {
        DispatcherBuilder::new()
    }
}

impl<T> Dispatcher<T> {
    /// Maximum number of simultaneously active units.
    pub fn limit(&self) -> usize {
        self.shared.limit
    }

    pub fn completion(&self) -> CompletionMode {
        self.shared.completion
    }

    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    /// Number of units currently executing.
    pub fn active(&self) -> usize {
        self.shared.lock().active
    }

    /// Number of units waiting for a free slot.
    pub fn queued(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Snapshot of the run's metrics.
    pub fn metrics(&self) -> DispatchMetrics {
        self.shared.lock().metrics.clone()
    }
}

impl<T> fmt::Debug for Dispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Dispatcher")
            .field("limit", &self.shared.limit)
            .field("completion", &self.shared.completion)
            .field("phase", &state.phase)
            .field("active", &state.active)
            .field("queued", &state.queue.len())
            .finish()
    }
}

// ── DispatcherBuilder ────────────────────────────────────────────────

/// Fluent builder for a [`Dispatcher`].
///
/// # Example
/// ```ignore
/// let dispatcher = Dispatcher::builder()
///     .limit(2)
///     .completion(CompletionMode::UntilClosed)
///     .unit(Unit::immediate(|| Ok::<_, BoxError>(1)))
///     .build()?;
/// ```
pub struct DispatcherBuilder<T> {
    config: DispatcherConfig,
    units: Vec<Unit<T>>,
}

impl<T: Send + 'static> DispatcherBuilder<T> {
    pub fn new() -> Self {
        Self {
            config: DispatcherConfig::default(),
            units: Vec::new(),
        }
    }

    /// Set the concurrency limit (default: 4).
    pub fn limit(mut self, limit: usize) -> Self {
        self.config.limit = limit;
        self
    }

    /// Set the completion policy (default: [`CompletionMode::Drain`]).
    pub fn completion(mut self, mode: CompletionMode) -> Self {
        self.config.completion = mode;
        self
    }

    /// Take limit and completion policy from a config.
    pub fn config(mut self, config: &DispatcherConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Add one unit to the initial backlog.
    pub fn unit(mut self, unit: Unit<T>) -> Self {
        self.units.push(unit);
        self
    }

    /// Add units to the initial backlog, preserving their order.
    pub fn units(mut self, units: impl IntoIterator<Item = Unit<T>>) -> Self {
        self.units.extend(units);
        self
    }

    pub fn build(self) -> Result<Dispatcher<T>, DispatchError> {
        self.config.validate()?;

        let mut state = RunState::new();
        for unit in self.units {
            state.enqueue(unit)?;
        }

        let initial = state.queue.len();
        debug!(
            limit = self.config.limit,
            completion = %self.config.completion,
            initial,
            first_wave = initial.min(self.config.limit),
            "dispatcher created"
        );

        Ok(Dispatcher {
            shared: Arc::new(Shared {
                limit: self.config.limit,
                completion: self.config.completion,
                state: Mutex::new(state),
            }),
        })
    }
}

impl<T: Send + 'static> Default for DispatcherBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
