use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::CompletionMode;
use crate::error::{BoxError, DispatchError, UsageError};
use crate::state::{Phase, RunState};

use super::core::Shared;
use super::Dispatcher;

impl<T: Send + 'static> Dispatcher<T> {
    /// Start the run and wait for its single terminal outcome.
    ///
    /// Resolves with every produced value in completion order, or with the
    /// first unit failure. On failure, units that are still executing keep
    /// running to their own completion but nothing they produce is reported.
    ///
    /// Calling `run()` again, whether concurrently or after the outcome was
    /// produced, fails with [`DispatchError::InvalidUsage`] and leaves the
    /// original run untouched.
    pub async fn run(&self) -> Result<Vec<T>, DispatchError> {
        let rx = {
            let mut state = self.shared.lock();
            match state.phase {
                Phase::Idle => {}
                Phase::Running => return Err(UsageError::AlreadyRunning.into()),
                Phase::Completed | Phase::Failed => {
                    return Err(UsageError::AlreadyFinished.into());
                }
            }
            let runtime = Handle::try_current().map_err(|_| UsageError::NoRuntime)?;

            let (tx, rx) = oneshot::channel();
            state.begin(tx, runtime);
            info!(
                run_id = ?state.metrics.run_id,
                limit = self.shared.limit,
                queued = state.queue.len(),
                completion = %self.shared.completion,
                "run started"
            );
            self.shared.fill_slots(&mut state);
            rx
        };

        rx.await.unwrap_or(Err(DispatchError::Aborted))
    }
}

impl<T: Send + 'static> Shared<T> {
    /// Start queued units until every slot is taken or the backlog is empty,
    /// then check whether the run is done.
    pub(super) fn fill_slots(self: &Arc<Self>, state: &mut RunState<T>) {
        while state.phase == Phase::Running && state.active < self.limit {
            let Some(runtime) = state.runtime.clone() else {
                break;
            };
            let Some(unit) = state.take() else {
                break;
            };

            let label = unit.label().unwrap_or_default().to_string();
            state.active += 1;
            state.metrics.record_start(state.active);
            debug!(unit = %label, active = state.active, limit = self.limit, "unit started");

            let outcome = unit.start();
            let shared = Arc::clone(self);
            runtime.spawn(async move {
                let outcome = outcome.await;
                shared.finish_unit(label, outcome);
            });
        }
        self.settle(state);
    }

    /// Record one unit's outcome. The slot is released before refilling so
    /// the freed capacity is visible to the refill loop.
    fn finish_unit(self: &Arc<Self>, label: String, outcome: Result<T, BoxError>) {
        let mut state = self.lock();
        state.active -= 1;

        match (state.phase, outcome) {
            (Phase::Running, Ok(value)) => {
                state.metrics.units_succeeded += 1;
                state.results.push(value);
                debug!(unit = %label, active = state.active, "unit finished");
            }
            (Phase::Running, Err(source)) => {
                state.metrics.units_failed += 1;
                warn!(
                    run_id = ?state.metrics.run_id,
                    unit = %label,
                    error = %source,
                    still_active = state.active,
                    dropped = state.queue.len(),
                    "unit failed, run aborted"
                );
                state.fail(DispatchError::UnitExecution { label, source });
            }
            (phase, outcome) => {
                state.metrics.units_discarded += 1;
                debug!(
                    unit = %label,
                    %phase,
                    succeeded = outcome.is_ok(),
                    "outcome discarded"
                );
            }
        }

        self.fill_slots(&mut state);
    }

    /// Latch `Completed` once nothing is active, nothing is queued and, in
    /// `UntilClosed` mode, the dispatcher has been closed.
    pub(super) fn settle(&self, state: &mut RunState<T>) {
        if state.phase != Phase::Running || !state.is_idle() {
            return;
        }
        if self.completion == CompletionMode::UntilClosed && !state.closed {
            return;
        }
        info!(
            run_id = ?state.metrics.run_id,
            results = state.results.len(),
            peak_active = state.metrics.peak_active,
            "run completed"
        );
        state.complete();
    }
}
