use foliosync_core::diagnostics::{DiagnosticsEvent, DiagnosticsSink};

/// Writes every diagnostics event to the log as a JSON document.
#[derive(Clone, Default)]
pub struct TracingDiagnosticsSink;

impl DiagnosticsSink for TracingDiagnosticsSink {
    fn report(&self, events: &[DiagnosticsEvent]) {
        for event in events {
            log_event(event);
        }
    }
}

fn log_event(event: &DiagnosticsEvent) {
    match serde_json::to_string(event) {
        Ok(json) => tracing::info!(
            target: "foliosync::diagnostics",
            kind = %event.kind,
            uuid = %event.uuid,
            "{}",
            json
        ),
        Err(err) => tracing::warn!("Failed to serialize diagnostics event: {}", err),
    }
}
