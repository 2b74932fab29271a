//! Where diagnostics drift goes once the differ has detected it.

use std::sync::{Arc, Mutex};

use super::DiagnosticsEvent;
use crate::snapshots::EntityKind;

/// Receives the metadata drift found while reconciling one delta.
///
/// The reconciler calls `report` at most once per delta or full load, with
/// every entity whose diagnostics changed, and never with an empty slice.
/// It runs inline on the reconciler's task, so implementations hand events
/// off and return; a sink that loses events does not affect the snapshots.
pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, events: &[DiagnosticsEvent]);
}

/// Discards every report. For hosts that do not surface diagnostics.
#[derive(Clone, Default)]
pub struct NoOpDiagnosticsSink;

impl DiagnosticsSink for NoOpDiagnosticsSink {
    fn report(&self, _events: &[DiagnosticsEvent]) {}
}

/// Keeps every report in memory, grouped the way the reconciler sent it.
#[derive(Clone, Default)]
pub struct RecordingDiagnosticsSink {
    reports: Arc<Mutex<Vec<Vec<DiagnosticsEvent>>>>,
}

impl RecordingDiagnosticsSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `report` calls received.
    pub fn report_count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }

    /// All events in arrival order.
    pub fn events(&self) -> Vec<DiagnosticsEvent> {
        self.reports.lock().unwrap().iter().flatten().cloned().collect()
    }

    /// Events reported for one entity.
    pub fn events_for(&self, kind: EntityKind, uuid: &str) -> Vec<DiagnosticsEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.kind == kind && event.uuid == uuid)
            .collect()
    }

    /// Events announcing withdrawn metadata.
    pub fn removals(&self) -> Vec<DiagnosticsEvent> {
        self.events()
            .into_iter()
            .filter(DiagnosticsEvent::is_removal)
            .collect()
    }

    /// Drains everything recorded so far.
    pub fn take(&self) -> Vec<DiagnosticsEvent> {
        let reports = std::mem::take(&mut *self.reports.lock().unwrap());
        reports.into_iter().flatten().collect()
    }
}

impl DiagnosticsSink for RecordingDiagnosticsSink {
    fn report(&self, events: &[DiagnosticsEvent]) {
        self.reports.lock().unwrap().push(events.to_vec());
    }
}
