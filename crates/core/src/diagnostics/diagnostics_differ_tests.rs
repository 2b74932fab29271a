//! Tests for the diagnostics change detector.

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use crate::diagnostics::{DiagnosticsDiffer, DiagnosticsSnapshot};
    use crate::snapshots::{EntityKind, PerformanceSnapshot, PortfolioSnapshot};

    fn snapshot(coverage: f64, provenance: &str) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            coverage_ratio: Some(coverage),
            provenance: Some(provenance.to_string()),
            ..Default::default()
        }
    }

    // ==================== Change Detection ====================

    #[test]
    fn test_first_observation_emits_every_defined_field() {
        let mut differ = DiagnosticsDiffer::new();

        let event = differ
            .observe(EntityKind::Portfolio, "p1", Some(snapshot(0.9, "cache")), "portfolio_values")
            .unwrap();

        assert_eq!(event.kind, EntityKind::Portfolio);
        assert_eq!(event.uuid, "p1");
        assert_eq!(event.source, "portfolio_values");
        assert_eq!(event.changed.len(), 2);
        assert_eq!(event.changed["coverage_ratio"].previous, None);
        assert_eq!(event.changed["coverage_ratio"].current, Some(json!(0.9)));
        assert_eq!(event.changed["provenance"].current, Some(json!("cache")));
        assert_eq!(event.snapshot, Some(snapshot(0.9, "cache")));
    }

    #[test]
    fn test_identical_observation_is_silent() {
        let mut differ = DiagnosticsDiffer::new();

        let first = differ.observe(EntityKind::Portfolio, "p1", Some(snapshot(0.9, "cache")), "t");
        let second = differ.observe(EntityKind::Portfolio, "p1", Some(snapshot(0.9, "cache")), "t");

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn test_only_changed_fields_are_reported() {
        let mut differ = DiagnosticsDiffer::new();
        differ.observe(EntityKind::Account, "a1", Some(snapshot(0.9, "cache")), "accounts");

        let event = differ
            .observe(EntityKind::Account, "a1", Some(snapshot(0.95, "cache")), "accounts")
            .unwrap();

        assert_eq!(event.changed.len(), 1);
        let change = &event.changed["coverage_ratio"];
        assert_eq!(change.previous, Some(json!(0.9)));
        assert_eq!(change.current, Some(json!(0.95)));
    }

    #[test]
    fn test_field_becoming_undefined_is_reported() {
        let mut differ = DiagnosticsDiffer::new();
        differ.observe(EntityKind::Account, "a1", Some(snapshot(0.9, "cache")), "accounts");

        let next = DiagnosticsSnapshot {
            coverage_ratio: Some(0.9),
            ..Default::default()
        };
        let event = differ
            .observe(EntityKind::Account, "a1", Some(next.clone()), "accounts")
            .unwrap();

        assert_eq!(event.changed.len(), 1);
        assert_eq!(event.changed["provenance"].current, None);
        assert_eq!(differ.last_seen(EntityKind::Account, "a1"), Some(next));
    }

    #[test]
    fn test_keys_are_scoped_by_kind() {
        let mut differ = DiagnosticsDiffer::new();
        differ.observe(EntityKind::Account, "x", Some(snapshot(0.5, "live")), "accounts");

        let event = differ.observe(
            EntityKind::Portfolio,
            "x",
            Some(snapshot(0.5, "live")),
            "portfolio_values",
        );

        assert!(event.is_some());
    }

    // ==================== Removal ====================

    #[test]
    fn test_removal_emits_once() {
        let mut differ = DiagnosticsDiffer::new();
        let full = DiagnosticsSnapshot {
            coverage_ratio: Some(0.9),
            provenance: Some("cache".to_string()),
            metric_run_uuid: Some("run-1".to_string()),
            generated_at: None,
        };
        differ.observe(EntityKind::Portfolio, "p1", Some(full), "portfolio_values");

        let removal = differ
            .observe(EntityKind::Portfolio, "p1", None, "portfolio_values")
            .unwrap();
        let again = differ.observe(EntityKind::Portfolio, "p1", None, "portfolio_values");

        assert!(removal.is_removal());
        let fields: Vec<&str> = removal.changed.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["coverage_ratio", "metric_run_uuid", "provenance"]);
        assert!(removal.changed.values().all(|change| change.current.is_none()));
        assert_eq!(removal.changed["metric_run_uuid"].previous, Some(json!("run-1")));
        assert!(again.is_none());
        assert_eq!(differ.last_seen(EntityKind::Portfolio, "p1"), None);
    }

    #[test]
    fn test_removal_without_history_is_silent() {
        let mut differ = DiagnosticsDiffer::new();
        assert!(differ.observe(EntityKind::Portfolio, "p1", None, "t").is_none());
    }

    #[test]
    fn test_empty_snapshot_counts_as_withdrawn() {
        let mut differ = DiagnosticsDiffer::new();
        differ.observe(EntityKind::Portfolio, "p1", Some(snapshot(0.9, "cache")), "t");

        let event = differ
            .observe(EntityKind::Portfolio, "p1", Some(DiagnosticsSnapshot::default()), "t")
            .unwrap();

        assert!(event.is_removal());
        assert!(differ
            .observe(EntityKind::Portfolio, "p1", Some(DiagnosticsSnapshot::default()), "t")
            .is_none());
    }

    #[test]
    fn test_forget_and_reset() {
        let mut differ = DiagnosticsDiffer::new();
        differ.observe(EntityKind::Portfolio, "p1", Some(snapshot(0.9, "cache")), "t");
        differ.observe(EntityKind::Portfolio, "p2", Some(snapshot(0.9, "cache")), "t");

        differ.forget(EntityKind::Portfolio, "p1");
        assert!(differ.observe(EntityKind::Portfolio, "p1", None, "t").is_none());

        differ.reset();
        assert_eq!(differ.last_seen(EntityKind::Portfolio, "p2"), None);
    }

    // ==================== Extraction ====================

    #[test]
    fn test_portfolio_coverage_falls_back_to_performance() {
        let portfolio = PortfolioSnapshot {
            uuid: "p1".to_string(),
            current_value: Some(dec!(10)),
            provenance: Some(r#"{"source":"db"}"#.to_string()),
            performance: Some(PerformanceSnapshot {
                coverage_ratio: Some(0.8),
                ..Default::default()
            }),
            ..Default::default()
        };

        let snapshot =
            DiagnosticsSnapshot::from_portfolio(&portfolio, Some("2024-05-01T10:00:00Z"));

        assert_eq!(snapshot.coverage_ratio, Some(0.8));
        assert_eq!(snapshot.provenance.as_deref(), Some(r#"{"source":"db"}"#));
        assert_eq!(snapshot.generated_at.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert!(!snapshot.is_empty());
    }
}
