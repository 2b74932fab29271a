//! Partial patches and the merge rules that fold them into snapshots.
//!
//! Patch fields are tri-state on the wire. For fields whose snapshot value is
//! nullable the patch holds `Option<Option<T>>`:
//!
//! - `None`: the key was absent, keep the current value
//! - `Some(None)`: explicit `null`, clear the value
//! - `Some(Some(v))`: replace with `v`
//!
//! Fields that cannot be absent on the snapshot use a plain `Option<T>`, so
//! both a missing key and `null` leave the current value untouched.

use log::warn;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::snapshots_model::{
    AccountSnapshot, AggregationSnapshot, AverageCostSnapshot, DayChangeSnapshot,
    PerformanceSnapshot, PortfolioSnapshot, PositionSnapshot,
};

/// Folds a partial patch into an existing value.
///
/// Implementations must be deterministic functions of `(self, patch)` so that
/// applying the same patch twice is the same as applying it once.
pub trait Merge {
    type Patch;

    fn apply_patch(&mut self, patch: &Self::Patch);
}

fn keep_or_set<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *slot = value.clone();
    }
}

fn set_nullable<T: Clone>(slot: &mut Option<T>, value: &Option<Option<T>>) {
    if let Some(value) = value {
        *slot = value.clone();
    }
}

/// Percentages survive a patch that does not carry them, even as `null`.
fn keep_percentage(slot: &mut Option<Decimal>, value: &Option<Decimal>) {
    if value.is_some() {
        *slot = *value;
    }
}

fn merge_nested<T: Merge + Default>(slot: &mut Option<T>, patch: &Option<Option<T::Patch>>) {
    match patch {
        None => {}
        Some(None) => *slot = None,
        Some(Some(patch)) => slot.get_or_insert_with(T::default).apply_patch(patch),
    }
}

fn merge_data_state(
    slot: &mut Option<Map<String, Value>>,
    patch: &Option<Option<Map<String, Value>>>,
) {
    match patch {
        None => {}
        Some(None) => *slot = None,
        Some(Some(patch)) => {
            let state = slot.get_or_insert_with(Map::new);
            for (key, value) in patch {
                state.insert(key.clone(), value.clone());
            }
        }
    }
}

// ==================== Account ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AccountPatch {
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub balance: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub orig_balance: Option<Option<Decimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fx_unavailable: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub coverage_ratio: Option<Option<f64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub provenance: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub metric_run_uuid: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub fx_rate: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub fx_rate_source: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub fx_rate_timestamp: Option<Option<String>>,
}

impl Merge for AccountSnapshot {
    type Patch = AccountPatch;

    fn apply_patch(&mut self, patch: &AccountPatch) {
        keep_or_set(&mut self.name, &patch.name);
        keep_or_set(&mut self.currency_code, &patch.currency_code);
        set_nullable(&mut self.balance, &patch.balance);
        set_nullable(&mut self.orig_balance, &patch.orig_balance);
        keep_or_set(&mut self.fx_unavailable, &patch.fx_unavailable);
        set_nullable(&mut self.coverage_ratio, &patch.coverage_ratio);
        set_nullable(&mut self.provenance, &patch.provenance);
        set_nullable(&mut self.metric_run_uuid, &patch.metric_run_uuid);
        set_nullable(&mut self.fx_rate, &patch.fx_rate);
        set_nullable(&mut self.fx_rate_source, &patch.fx_rate_source);
        set_nullable(&mut self.fx_rate_timestamp, &patch.fx_rate_timestamp);
    }
}

// ==================== Portfolio ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PortfolioPatch {
    pub uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_value_positions: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub current_value: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub purchase_value: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub purchase_sum: Option<Option<Decimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_current_value: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub performance: Option<Option<PerformancePatch>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub coverage_ratio: Option<Option<f64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub provenance: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub metric_run_uuid: Option<Option<String>>,
    /// Absent leaves the list alone, an empty list clears it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<PositionPatch>>,
}

impl Merge for PortfolioSnapshot {
    type Patch = PortfolioPatch;

    fn apply_patch(&mut self, patch: &PortfolioPatch) {
        keep_or_set(&mut self.name, &patch.name);
        keep_or_set(&mut self.position_count, &patch.position_count);
        keep_or_set(
            &mut self.missing_value_positions,
            &patch.missing_value_positions,
        );
        set_nullable(&mut self.current_value, &patch.current_value);
        if let Some(purchase) = patch.purchase_value.or(patch.purchase_sum) {
            self.purchase_value = purchase;
            self.purchase_sum = purchase;
        }
        keep_or_set(&mut self.has_current_value, &patch.has_current_value);
        merge_nested(&mut self.performance, &patch.performance);
        set_nullable(&mut self.coverage_ratio, &patch.coverage_ratio);
        set_nullable(&mut self.provenance, &patch.provenance);
        set_nullable(&mut self.metric_run_uuid, &patch.metric_run_uuid);
        if let Some(positions) = &patch.positions {
            merge_positions(self.positions.get_or_insert_with(Vec::new), positions);
        }
    }
}

// ==================== Position ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PositionPatch {
    pub security_uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_holdings: Option<Decimal>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub purchase_value: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub current_value: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub average_cost: Option<Option<AverageCostPatch>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub performance: Option<Option<PerformancePatch>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub aggregation: Option<Option<AggregationPatch>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub data_state: Option<Option<Map<String, Value>>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub last_price_native: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub last_price_eur: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub last_close_native: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub last_close_eur: Option<Option<Decimal>>,
}

impl Merge for PositionSnapshot {
    type Patch = PositionPatch;

    fn apply_patch(&mut self, patch: &PositionPatch) {
        keep_or_set(&mut self.name, &patch.name);
        keep_or_set(&mut self.current_holdings, &patch.current_holdings);
        set_nullable(&mut self.purchase_value, &patch.purchase_value);
        set_nullable(&mut self.current_value, &patch.current_value);
        merge_nested(&mut self.average_cost, &patch.average_cost);
        merge_nested(&mut self.performance, &patch.performance);
        merge_nested(&mut self.aggregation, &patch.aggregation);
        merge_data_state(&mut self.data_state, &patch.data_state);
        set_nullable(&mut self.last_price_native, &patch.last_price_native);
        set_nullable(&mut self.last_price_eur, &patch.last_price_eur);
        set_nullable(&mut self.last_close_native, &patch.last_close_native);
        set_nullable(&mut self.last_close_eur, &patch.last_close_eur);
    }
}

impl PositionSnapshot {
    pub fn from_patch(patch: &PositionPatch) -> Self {
        let mut position = PositionSnapshot {
            security_uuid: patch.security_uuid.clone(),
            ..Default::default()
        };
        position.apply_patch(patch);
        position
    }
}

/// Merges position patches into a list keyed by `security_uuid`.
///
/// An empty patch list clears `positions`. Otherwise every patch is folded
/// into the entry with the same id, or appended when there is none. Entries
/// the patch does not mention are kept in place.
pub fn merge_positions(positions: &mut Vec<PositionSnapshot>, patches: &[PositionPatch]) {
    if patches.is_empty() {
        positions.clear();
        return;
    }

    for patch in patches {
        if patch.security_uuid.is_empty() {
            warn!("Skipping position patch without security_uuid");
            continue;
        }
        match positions
            .iter_mut()
            .find(|p| p.security_uuid == patch.security_uuid)
        {
            Some(existing) => existing.apply_patch(patch),
            None => positions.push(PositionSnapshot::from_patch(patch)),
        }
    }
}

/// Collapses a full position list to one entry per `security_uuid`.
///
/// A later entry replaces an earlier one in place; entries without an id are
/// dropped.
pub fn dedup_positions(positions: Vec<PositionSnapshot>) -> Vec<PositionSnapshot> {
    let mut unique: Vec<PositionSnapshot> = Vec::with_capacity(positions.len());
    for position in positions {
        if position.security_uuid.is_empty() {
            warn!("Dropping position without security_uuid");
            continue;
        }
        match unique
            .iter_mut()
            .find(|p| p.security_uuid == position.security_uuid)
        {
            Some(existing) => *existing = position,
            None => unique.push(position),
        }
    }
    unique
}

// ==================== Nested objects ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PerformancePatch {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub gain_abs: Option<Option<Decimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain_pct: Option<Decimal>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub total_change_eur: Option<Option<Decimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_change_pct: Option<Decimal>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub source: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub coverage_ratio: Option<Option<f64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub day_change: Option<Option<DayChangePatch>>,
}

impl Merge for PerformanceSnapshot {
    type Patch = PerformancePatch;

    fn apply_patch(&mut self, patch: &PerformancePatch) {
        set_nullable(&mut self.gain_abs, &patch.gain_abs);
        keep_percentage(&mut self.gain_pct, &patch.gain_pct);
        set_nullable(&mut self.total_change_eur, &patch.total_change_eur);
        keep_percentage(&mut self.total_change_pct, &patch.total_change_pct);
        set_nullable(&mut self.source, &patch.source);
        set_nullable(&mut self.coverage_ratio, &patch.coverage_ratio);
        merge_nested(&mut self.day_change, &patch.day_change);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DayChangePatch {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub price_change_native: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub price_change_eur: Option<Option<Decimal>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_pct: Option<Decimal>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub source: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub coverage_ratio: Option<Option<f64>>,
}

impl Merge for DayChangeSnapshot {
    type Patch = DayChangePatch;

    fn apply_patch(&mut self, patch: &DayChangePatch) {
        set_nullable(&mut self.price_change_native, &patch.price_change_native);
        set_nullable(&mut self.price_change_eur, &patch.price_change_eur);
        keep_percentage(&mut self.change_pct, &patch.change_pct);
        set_nullable(&mut self.source, &patch.source);
        set_nullable(&mut self.coverage_ratio, &patch.coverage_ratio);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AverageCostPatch {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub native: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub security: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub account: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub eur: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub source: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub coverage_ratio: Option<Option<f64>>,
}

impl Merge for AverageCostSnapshot {
    type Patch = AverageCostPatch;

    fn apply_patch(&mut self, patch: &AverageCostPatch) {
        set_nullable(&mut self.native, &patch.native);
        set_nullable(&mut self.security, &patch.security);
        set_nullable(&mut self.account, &patch.account);
        set_nullable(&mut self.eur, &patch.eur);
        set_nullable(&mut self.source, &patch.source);
        set_nullable(&mut self.coverage_ratio, &patch.coverage_ratio);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AggregationPatch {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub total_holdings: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub positive_holdings: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub purchase_value_cents: Option<Option<i64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub purchase_value_eur: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub security_currency_total: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub account_currency_total: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub purchase_total_security: Option<Option<Decimal>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    pub purchase_total_account: Option<Option<Decimal>>,
}

impl Merge for AggregationSnapshot {
    type Patch = AggregationPatch;

    fn apply_patch(&mut self, patch: &AggregationPatch) {
        set_nullable(&mut self.total_holdings, &patch.total_holdings);
        set_nullable(&mut self.positive_holdings, &patch.positive_holdings);
        set_nullable(&mut self.purchase_value_cents, &patch.purchase_value_cents);
        set_nullable(&mut self.purchase_value_eur, &patch.purchase_value_eur);
        set_nullable(
            &mut self.security_currency_total,
            &patch.security_currency_total,
        );
        set_nullable(
            &mut self.account_currency_total,
            &patch.account_currency_total,
        );
        set_nullable(
            &mut self.purchase_total_security,
            &patch.purchase_total_security,
        );
        set_nullable(
            &mut self.purchase_total_account,
            &patch.purchase_total_account,
        );
    }
}
