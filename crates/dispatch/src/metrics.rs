use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Per-run dispatcher metrics, updated inside the run-state critical section.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchMetrics {
    /// Identifier assigned when the run starts.
    pub run_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Units accepted by `push` or at construction.
    pub units_submitted: u64,
    pub units_started: u64,
    pub units_succeeded: u64,
    pub units_failed: u64,
    /// Outcomes of units that finished after the run had already failed.
    pub units_discarded: u64,
    /// Queued units that were never started because the run failed.
    pub units_dropped: u64,
    /// Highest number of simultaneously active units observed.
    pub peak_active: usize,
}

impl DispatchMetrics {
    pub(crate) fn begin(&mut self) -> Uuid {
        let run_id = Uuid::new_v4();
        self.run_id = Some(run_id);
        self.started_at = Some(Utc::now());
        run_id
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Record a unit start given the active count after the increment.
    pub(crate) fn record_start(&mut self, active: usize) {
        self.units_started += 1;
        self.peak_active = self.peak_active.max(active);
    }

    /// Wall-clock time between run start and finish, if the run has finished.
    pub fn elapsed(&self) -> Option<Duration> {
        let (start, end) = (self.started_at?, self.finished_at?);
        end.signed_duration_since(start).to_std().ok()
    }

    /// Outcomes received, whether recorded or discarded.
    pub fn units_finished(&self) -> u64 {
        self.units_succeeded + self.units_failed + self.units_discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics() {
        let m = DispatchMetrics::default();
        assert!(m.run_id.is_none());
        assert_eq!(m.units_started, 0);
        assert_eq!(m.peak_active, 0);
        assert!(m.elapsed().is_none());
    }

    #[test]
    fn peak_tracks_highest_active_count() {
        let mut m = DispatchMetrics::default();
        m.record_start(1);
        m.record_start(3);
        m.record_start(2);
        assert_eq!(m.units_started, 3);
        assert_eq!(m.peak_active, 3);
    }

    #[test]
    fn elapsed_available_after_finish() {
        let mut m = DispatchMetrics::default();
        let id = m.begin();
        assert_eq!(m.run_id, Some(id));
        assert!(m.elapsed().is_none());
        m.finish();
        assert!(m.elapsed().is_some());
    }

    #[test]
    fn serializes_to_json() {
        let mut m = DispatchMetrics::default();
        m.units_submitted = 2;
        m.units_succeeded = 1;
        m.units_discarded = 1;
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["units_submitted"], 2);
        assert_eq!(m.units_finished(), 2);
    }
}
