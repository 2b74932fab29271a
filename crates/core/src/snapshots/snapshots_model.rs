//! Snapshot domain models for accounts, portfolios and positions.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::snapshots_patch::dedup_positions;

/// Fully-merged account state as rendered in the overview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AccountSnapshot {
    pub uuid: String,
    pub name: String,
    pub currency_code: String,
    /// Balance converted to EUR. `None` when no FX rate was available.
    pub balance: Option<Decimal>,
    /// Balance in the account's own currency.
    pub orig_balance: Option<Decimal>,
    #[serde(default)]
    pub fx_unavailable: bool,
    #[serde(default)]
    pub coverage_ratio: Option<f64>,
    /// Free text or a JSON document serialized as a string.
    #[serde(default)]
    pub provenance: Option<String>,
    #[serde(default)]
    pub metric_run_uuid: Option<String>,
    #[serde(default)]
    pub fx_rate: Option<Decimal>,
    #[serde(default)]
    pub fx_rate_source: Option<String>,
    #[serde(default)]
    pub fx_rate_timestamp: Option<String>,
}

/// Fully-merged portfolio state, optionally carrying its positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PortfolioSnapshot {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub position_count: u32,
    #[serde(default)]
    pub missing_value_positions: u32,
    /// `None` means the value could not be computed for this revision.
    pub current_value: Option<Decimal>,
    /// Same quantity as `purchase_sum`; both are always kept equal.
    #[serde(default)]
    pub purchase_value: Option<Decimal>,
    #[serde(default)]
    pub purchase_sum: Option<Decimal>,
    #[serde(default)]
    pub has_current_value: bool,
    #[serde(default)]
    pub performance: Option<PerformanceSnapshot>,
    #[serde(default)]
    pub coverage_ratio: Option<f64>,
    #[serde(default)]
    pub provenance: Option<String>,
    #[serde(default)]
    pub metric_run_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<PositionSnapshot>>,
}

impl PortfolioSnapshot {
    /// Aligns the `purchase_value`/`purchase_sum` aliases after a full load
    /// and keys embedded positions by `security_uuid`.
    ///
    /// `purchase_value` wins when both are present and disagree.
    pub fn normalize(mut self) -> Self {
        let purchase = self.purchase_value.or(self.purchase_sum);
        self.purchase_value = purchase;
        self.purchase_sum = purchase;
        self.positions = self.positions.map(dedup_positions);
        self
    }
}

/// A single holding inside a portfolio, keyed by `security_uuid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PositionSnapshot {
    pub security_uuid: String,
    pub name: String,
    #[serde(default)]
    pub current_holdings: Decimal,
    #[serde(default)]
    pub purchase_value: Option<Decimal>,
    #[serde(default)]
    pub current_value: Option<Decimal>,
    #[serde(default)]
    pub average_cost: Option<AverageCostSnapshot>,
    #[serde(default)]
    pub performance: Option<PerformanceSnapshot>,
    #[serde(default)]
    pub aggregation: Option<AggregationSnapshot>,
    /// Free-form diagnostic bag, merged key by key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_state: Option<Map<String, Value>>,
    #[serde(default)]
    pub last_price_native: Option<Decimal>,
    #[serde(default)]
    pub last_price_eur: Option<Decimal>,
    #[serde(default)]
    pub last_close_native: Option<Decimal>,
    #[serde(default)]
    pub last_close_eur: Option<Decimal>,
}

/// Gain and change figures shared by portfolios and positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PerformanceSnapshot {
    #[serde(default)]
    pub gain_abs: Option<Decimal>,
    #[serde(default)]
    pub gain_pct: Option<Decimal>,
    #[serde(default)]
    pub total_change_eur: Option<Decimal>,
    #[serde(default)]
    pub total_change_pct: Option<Decimal>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub coverage_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_change: Option<DayChangeSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DayChangeSnapshot {
    #[serde(default)]
    pub price_change_native: Option<Decimal>,
    #[serde(default)]
    pub price_change_eur: Option<Decimal>,
    #[serde(default)]
    pub change_pct: Option<Decimal>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub coverage_ratio: Option<f64>,
}

/// Average purchase price in each of the currencies a position is viewed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AverageCostSnapshot {
    #[serde(default)]
    pub native: Option<Decimal>,
    #[serde(default)]
    pub security: Option<Decimal>,
    #[serde(default)]
    pub account: Option<Decimal>,
    #[serde(default)]
    pub eur: Option<Decimal>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub coverage_ratio: Option<f64>,
}

/// Raw holding and purchase totals.
///
/// `purchase_value_cents` is in minor units of the account currency; the
/// `*_total` fields are currency-converted sums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AggregationSnapshot {
    #[serde(default)]
    pub total_holdings: Option<Decimal>,
    #[serde(default)]
    pub positive_holdings: Option<Decimal>,
    #[serde(default)]
    pub purchase_value_cents: Option<i64>,
    #[serde(default)]
    pub purchase_value_eur: Option<Decimal>,
    #[serde(default)]
    pub security_currency_total: Option<Decimal>,
    #[serde(default)]
    pub account_currency_total: Option<Decimal>,
    #[serde(default)]
    pub purchase_total_security: Option<Decimal>,
    #[serde(default)]
    pub purchase_total_account: Option<Decimal>,
}
