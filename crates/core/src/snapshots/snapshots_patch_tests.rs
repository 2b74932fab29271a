//! Tests for patch decoding and merge rules.

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use crate::snapshots::{
        dedup_positions, merge_positions, AccountPatch, AccountSnapshot, Merge,
        PerformanceSnapshot, PortfolioPatch, PortfolioSnapshot, PositionPatch, PositionSnapshot,
    };

    fn portfolio_with_performance() -> PortfolioSnapshot {
        PortfolioSnapshot {
            uuid: "p1".to_string(),
            name: "Depot".to_string(),
            current_value: Some(dec!(1000)),
            purchase_value: Some(dec!(800)),
            purchase_sum: Some(dec!(800)),
            has_current_value: true,
            performance: Some(PerformanceSnapshot {
                gain_abs: Some(dec!(200)),
                gain_pct: Some(dec!(5)),
                total_change_eur: Some(dec!(200)),
                total_change_pct: Some(dec!(25)),
                source: Some("calculated".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn position(id: &str, holdings: rust_decimal::Decimal) -> PositionSnapshot {
        PositionSnapshot {
            security_uuid: id.to_string(),
            name: format!("Security {}", id),
            current_holdings: holdings,
            ..Default::default()
        }
    }

    // ==================== Wire Decoding Tests ====================

    #[test]
    fn test_patch_distinguishes_absent_from_null() {
        let patch: AccountPatch =
            serde_json::from_value(json!({ "uuid": "a1", "balance": null })).unwrap();

        assert_eq!(patch.balance, Some(None));
        assert_eq!(patch.orig_balance, None);
        assert_eq!(patch.metric_run_uuid, None);
    }

    #[test]
    fn test_null_on_non_nullable_field_is_ignored() {
        let patch: AccountPatch =
            serde_json::from_value(json!({ "uuid": "a1", "name": null })).unwrap();
        assert_eq!(patch.name, None);

        let mut account = AccountSnapshot {
            uuid: "a1".to_string(),
            name: "Girokonto".to_string(),
            ..Default::default()
        };
        account.apply_patch(&patch);
        assert_eq!(account.name, "Girokonto");
    }

    #[test]
    fn test_patch_serialization_skips_absent_fields() {
        let patch = AccountPatch {
            uuid: "a1".to_string(),
            metric_run_uuid: Some(None),
            ..Default::default()
        };

        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, json!({ "uuid": "a1", "metric_run_uuid": null }));
    }

    // ==================== Account Merge Tests ====================

    #[test]
    fn test_account_absent_fields_are_preserved() {
        let mut account = AccountSnapshot {
            uuid: "a1".to_string(),
            name: "Girokonto".to_string(),
            currency_code: "USD".to_string(),
            balance: Some(dec!(90)),
            orig_balance: Some(dec!(100)),
            metric_run_uuid: Some("run-1".to_string()),
            ..Default::default()
        };
        let patch: AccountPatch =
            serde_json::from_value(json!({ "uuid": "a1", "balance": 95.5 })).unwrap();

        account.apply_patch(&patch);

        assert_eq!(account.balance, Some(dec!(95.5)));
        assert_eq!(account.orig_balance, Some(dec!(100)));
        assert_eq!(account.metric_run_uuid.as_deref(), Some("run-1"));
        assert_eq!(account.currency_code, "USD");
    }

    #[test]
    fn test_account_explicit_null_clears_nullable_field() {
        let mut account = AccountSnapshot {
            uuid: "a1".to_string(),
            metric_run_uuid: Some("run-1".to_string()),
            balance: Some(dec!(10)),
            ..Default::default()
        };
        let patch: AccountPatch = serde_json::from_value(json!({
            "uuid": "a1",
            "metric_run_uuid": null,
            "fx_unavailable": true,
            "balance": null
        }))
        .unwrap();

        account.apply_patch(&patch);

        assert_eq!(account.metric_run_uuid, None);
        assert_eq!(account.balance, None);
        assert!(account.fx_unavailable);
    }

    // ==================== Portfolio Merge Tests ====================

    #[test]
    fn test_tick_keeps_purchase_sum() {
        let mut portfolio = portfolio_with_performance();
        let patch: PortfolioPatch =
            serde_json::from_value(json!({ "uuid": "p1", "current_value": 1050 })).unwrap();

        portfolio.apply_patch(&patch);

        assert_eq!(portfolio.current_value, Some(dec!(1050)));
        assert_eq!(portfolio.purchase_sum, Some(dec!(800)));
        assert_eq!(portfolio.purchase_value, Some(dec!(800)));
    }

    #[test]
    fn test_purchase_aliases_stay_in_sync() {
        let mut portfolio = portfolio_with_performance();

        let patch: PortfolioPatch =
            serde_json::from_value(json!({ "uuid": "p1", "purchase_sum": 900 })).unwrap();
        portfolio.apply_patch(&patch);
        assert_eq!(portfolio.purchase_value, Some(dec!(900)));
        assert_eq!(portfolio.purchase_sum, Some(dec!(900)));

        let patch: PortfolioPatch = serde_json::from_value(json!({
            "uuid": "p1",
            "purchase_value": 950,
            "purchase_sum": 940
        }))
        .unwrap();
        portfolio.apply_patch(&patch);
        assert_eq!(portfolio.purchase_value, Some(dec!(950)));
        assert_eq!(portfolio.purchase_sum, Some(dec!(950)));
    }

    #[test]
    fn test_null_current_value_marks_value_not_computable() {
        let mut portfolio = portfolio_with_performance();
        let patch: PortfolioPatch = serde_json::from_value(json!({
            "uuid": "p1",
            "current_value": null,
            "has_current_value": false
        }))
        .unwrap();

        portfolio.apply_patch(&patch);

        assert_eq!(portfolio.current_value, None);
        assert!(!portfolio.has_current_value);
        assert_eq!(portfolio.purchase_sum, Some(dec!(800)));
    }

    #[test]
    fn test_performance_percentages_survive_absolute_tick() {
        let mut portfolio = portfolio_with_performance();
        let patch: PortfolioPatch = serde_json::from_value(json!({
            "uuid": "p1",
            "performance": { "gain_abs": 10 }
        }))
        .unwrap();

        portfolio.apply_patch(&patch);

        let performance = portfolio.performance.unwrap();
        assert_eq!(performance.gain_abs, Some(dec!(10)));
        assert_eq!(performance.gain_pct, Some(dec!(5)));
        assert_eq!(performance.total_change_pct, Some(dec!(25)));
        assert_eq!(performance.source.as_deref(), Some("calculated"));
    }

    #[test]
    fn test_performance_null_percentage_keeps_previous() {
        let mut portfolio = portfolio_with_performance();
        let patch: PortfolioPatch = serde_json::from_value(json!({
            "uuid": "p1",
            "performance": { "gain_pct": null, "total_change_pct": 30 }
        }))
        .unwrap();

        portfolio.apply_patch(&patch);

        let performance = portfolio.performance.unwrap();
        assert_eq!(performance.gain_pct, Some(dec!(5)));
        assert_eq!(performance.total_change_pct, Some(dec!(30)));
    }

    #[test]
    fn test_day_change_merges_inside_performance() {
        let mut portfolio = portfolio_with_performance();
        let first: PortfolioPatch = serde_json::from_value(json!({
            "uuid": "p1",
            "performance": {
                "day_change": { "price_change_eur": 4, "change_pct": 0.4, "source": "quotes" }
            }
        }))
        .unwrap();
        let second: PortfolioPatch = serde_json::from_value(json!({
            "uuid": "p1",
            "performance": { "day_change": { "price_change_eur": 6 } }
        }))
        .unwrap();

        portfolio.apply_patch(&first);
        portfolio.apply_patch(&second);

        let day_change = portfolio.performance.unwrap().day_change.unwrap();
        assert_eq!(day_change.price_change_eur, Some(dec!(6)));
        assert_eq!(day_change.change_pct, Some(dec!(0.4)));
        assert_eq!(day_change.source.as_deref(), Some("quotes"));
    }

    #[test]
    fn test_null_performance_clears_nested_object() {
        let mut portfolio = portfolio_with_performance();
        let patch: PortfolioPatch =
            serde_json::from_value(json!({ "uuid": "p1", "performance": null })).unwrap();

        portfolio.apply_patch(&patch);

        assert_eq!(portfolio.performance, None);
    }

    // ==================== Position Merge Tests ====================

    #[test]
    fn test_portfolio_patch_without_positions_keeps_list() {
        let mut portfolio = portfolio_with_performance();
        portfolio.positions = Some(vec![position("s1", dec!(3))]);
        let patch: PortfolioPatch =
            serde_json::from_value(json!({ "uuid": "p1", "name": "Renamed" })).unwrap();

        portfolio.apply_patch(&patch);

        assert_eq!(portfolio.name, "Renamed");
        assert_eq!(portfolio.positions.unwrap().len(), 1);
    }

    #[test]
    fn test_portfolio_patch_with_empty_positions_clears_list() {
        let mut portfolio = portfolio_with_performance();
        portfolio.positions = Some(vec![position("s1", dec!(3)), position("s2", dec!(1))]);
        let patch: PortfolioPatch =
            serde_json::from_value(json!({ "uuid": "p1", "positions": [] })).unwrap();

        portfolio.apply_patch(&patch);

        assert_eq!(portfolio.positions, Some(vec![]));
    }

    #[test]
    fn test_merge_positions_by_security_uuid() {
        let mut positions = vec![position("s1", dec!(3)), position("s2", dec!(1))];
        let patches: Vec<PositionPatch> = serde_json::from_value(json!([
            { "security_uuid": "s2", "current_value": 42.5 },
            { "security_uuid": "s3", "name": "New", "current_holdings": 7 }
        ]))
        .unwrap();

        merge_positions(&mut positions, &patches);

        let ids: Vec<&str> = positions.iter().map(|p| p.security_uuid.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2", "s3"]);
        assert_eq!(positions[1].current_value, Some(dec!(42.5)));
        assert_eq!(positions[1].current_holdings, dec!(1));
        assert_eq!(positions[2].name, "New");
        assert_eq!(positions[2].current_holdings, dec!(7));
    }

    #[test]
    fn test_merge_positions_skips_patch_without_id() {
        let mut positions = vec![position("s1", dec!(3))];
        let patches = vec![PositionPatch {
            security_uuid: String::new(),
            name: Some("Ghost".to_string()),
            ..Default::default()
        }];

        merge_positions(&mut positions, &patches);

        assert_eq!(positions, vec![position("s1", dec!(3))]);
    }

    #[test]
    fn test_position_nested_objects_merge_shallowly() {
        let mut positions = Vec::new();
        let first: Vec<PositionPatch> = serde_json::from_value(json!([{
            "security_uuid": "s1",
            "average_cost": { "native": 10, "eur": 9.5, "source": "totals" },
            "aggregation": { "total_holdings": 4, "purchase_value_cents": 3800 },
            "data_state": { "status": "ok", "hint": "fresh" }
        }]))
        .unwrap();
        let second: Vec<PositionPatch> = serde_json::from_value(json!([{
            "security_uuid": "s1",
            "average_cost": { "eur": 9.75 },
            "aggregation": { "purchase_value_cents": 3900 },
            "data_state": { "status": "stale" }
        }]))
        .unwrap();

        merge_positions(&mut positions, &first);
        merge_positions(&mut positions, &second);

        let merged = &positions[0];
        let average_cost = merged.average_cost.as_ref().unwrap();
        assert_eq!(average_cost.native, Some(dec!(10)));
        assert_eq!(average_cost.eur, Some(dec!(9.75)));
        assert_eq!(average_cost.source.as_deref(), Some("totals"));

        let aggregation = merged.aggregation.as_ref().unwrap();
        assert_eq!(aggregation.total_holdings, Some(dec!(4)));
        assert_eq!(aggregation.purchase_value_cents, Some(3900));

        let data_state = merged.data_state.as_ref().unwrap();
        assert_eq!(data_state.get("status"), Some(&json!("stale")));
        assert_eq!(data_state.get("hint"), Some(&json!("fresh")));
    }

    #[test]
    fn test_merge_is_idempotent_for_portfolio_patch() {
        let base = portfolio_with_performance();
        let patch: PortfolioPatch = serde_json::from_value(json!({
            "uuid": "p1",
            "current_value": 1100,
            "performance": { "gain_abs": 300 },
            "positions": [{ "security_uuid": "s1", "current_holdings": 2 }]
        }))
        .unwrap();

        let mut once = base.clone();
        once.apply_patch(&patch);
        let mut twice = once.clone();
        twice.apply_patch(&patch);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_dedup_positions_keeps_last_entry_in_place() {
        let position = |id: &str, value| PositionSnapshot {
            security_uuid: id.to_string(),
            current_value: Some(value),
            ..Default::default()
        };

        let unique = dedup_positions(vec![
            position("s1", dec!(1)),
            position("s2", dec!(2)),
            position("", dec!(3)),
            position("s1", dec!(4)),
        ]);

        let ids: Vec<&str> = unique.iter().map(|p| p.security_uuid.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(unique[0].current_value, Some(dec!(4)));
    }

    #[test]
    fn test_normalize_keys_embedded_positions() {
        let portfolio = PortfolioSnapshot {
            uuid: "p1".to_string(),
            purchase_sum: Some(dec!(800)),
            positions: Some(vec![
                PositionSnapshot {
                    security_uuid: "s1".to_string(),
                    ..Default::default()
                },
                PositionSnapshot {
                    security_uuid: "s1".to_string(),
                    name: "Later".to_string(),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }
        .normalize();

        assert_eq!(portfolio.purchase_value, Some(dec!(800)));
        let positions = portfolio.positions.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].name, "Later");
    }
}
