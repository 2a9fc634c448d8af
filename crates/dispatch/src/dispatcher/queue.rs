use tracing::debug;

use crate::error::{DispatchError, UsageError};
use crate::state::RunState;
use crate::unit::Unit;

use super::Dispatcher;

impl<T> RunState<T> {
    /// Append a unit to the back of the backlog, assigning its default label.
    ///
    /// Rejected once the run has reached a terminal state.
    pub(crate) fn enqueue(&mut self, unit: Unit<T>) -> Result<(), UsageError> {
        let unit = unit.labeled_or(self.next_seq + 1);
        if self.phase.is_terminal() {
            return Err(UsageError::PushAfterFinish {
                label: unit.label().unwrap_or_default().to_string(),
            });
        }
        self.next_seq += 1;
        self.metrics.units_submitted += 1;
        self.queue.push_back(unit);
        Ok(())
    }

    /// Remove the unit at the front of the backlog.
    pub(crate) fn take(&mut self) -> Option<Unit<T>> {
        self.queue.pop_front()
    }
}

impl<T: Send + 'static> Dispatcher<T> {
    /// Append one unit to the backlog.
    ///
    /// Never blocks. While a run is in progress the unit is started as soon
    /// as a slot is free. Fails with [`UsageError::PushAfterFinish`] once the
    /// run has finished; the unit is dropped without running.
    pub fn push(&self, unit: Unit<T>) -> Result<(), DispatchError> {
        self.push_all(std::iter::once(unit))
    }

    /// Append units to the backlog in iteration order.
    pub fn push_all(&self, units: impl IntoIterator<Item = Unit<T>>) -> Result<(), DispatchError> {
        let mut state = self.shared.lock();
        let mut pushed = 0usize;
        for unit in units {
            state.enqueue(unit)?;
            pushed += 1;
        }
        if pushed > 0 {
            debug!(
                pushed,
                queued = state.queue.len(),
                phase = %state.phase,
                "units pushed"
            );
        }
        self.shared.fill_slots(&mut state);
        Ok(())
    }

    /// Signal that no more units will be pushed.
    ///
    /// Only relevant in [`CompletionMode::UntilClosed`](crate::CompletionMode::UntilClosed),
    /// where a drained run waits for this before completing. Pushes arriving
    /// after `close()` but before completion are still accepted. Idempotent.
    pub fn close(&self) {
        let mut state = self.shared.lock();
        if !state.closed {
            state.closed = true;
            debug!(phase = %state.phase, queued = state.queue.len(), "dispatcher closed");
        }
        self.shared.settle(&mut state);
    }
}
