//! Per-run state owned by a dispatcher.
//!
//! All fields are mutated only while holding the dispatcher's state lock.

use std::collections::VecDeque;
use std::fmt;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

use crate::error::DispatchError;
use crate::metrics::DispatchMetrics;
use crate::unit::Unit;

/// Lifecycle of a dispatcher's single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Accepting units, `run()` not yet called.
    Idle,
    /// Units are being started and collected.
    Running,
    /// Every unit succeeded and the backlog drained.
    Completed,
    /// A unit failed; later outcomes are discarded.
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

pub(crate) type Outcome<T> = Result<Vec<T>, DispatchError>;

/// Backlog, active-set accounting and collected results for one run.
pub(crate) struct RunState<T> {
    pub(crate) phase: Phase,
    /// Not-yet-started units, FIFO.
    pub(crate) queue: VecDeque<Unit<T>>,
    /// Units currently executing. Never exceeds the dispatcher limit.
    pub(crate) active: usize,
    /// Produced values in completion order.
    pub(crate) results: Vec<T>,
    /// Set by `close()`; only consulted in `UntilClosed` mode.
    pub(crate) closed: bool,
    /// Submission sequence counter used for default labels.
    pub(crate) next_seq: u64,
    /// Runtime the run was started on; units are spawned here.
    pub(crate) runtime: Option<Handle>,
    /// Terminal-state latch. Taken exactly once.
    outcome: Option<oneshot::Sender<Outcome<T>>>,
    pub(crate) metrics: DispatchMetrics,
}

impl<T> RunState<T> {
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::Idle,
            queue: VecDeque::new(),
            active: 0,
            results: Vec::new(),
            closed: false,
            next_seq: 0,
            runtime: None,
            outcome: None,
            metrics: DispatchMetrics::default(),
        }
    }

    /// Move `Idle -> Running` and install the outcome channel.
    pub(crate) fn begin(&mut self, tx: oneshot::Sender<Outcome<T>>, runtime: Handle) {
        self.phase = Phase::Running;
        self.outcome = Some(tx);
        self.runtime = Some(runtime);
        self.metrics.begin();
    }

    /// True when nothing is executing and nothing is waiting.
    pub(crate) fn is_idle(&self) -> bool {
        self.active == 0 && self.queue.is_empty()
    }

    /// Latch `Running -> Completed` and hand the results to the waiting caller.
    pub(crate) fn complete(&mut self) {
        self.phase = Phase::Completed;
        self.metrics.finish();
        let results = std::mem::take(&mut self.results);
        self.resolve(Ok(results));
    }

    /// Latch `Running -> Failed`. Collected results and the remaining backlog
    /// are dropped; active units keep running but their outcomes are discarded.
    pub(crate) fn fail(&mut self, err: DispatchError) {
        self.phase = Phase::Failed;
        self.metrics.finish();
        self.metrics.units_dropped += self.queue.len() as u64;
        self.queue.clear();
        self.results.clear();
        self.resolve(Err(err));
    }

    fn resolve(&mut self, outcome: Outcome<T>) {
        if let Some(tx) = self.outcome.take() {
            // The caller may have dropped its run() future; nothing to report to.
            let _ = tx.send(outcome);
        }
        self.runtime = None;
    }
}
