//! Diagnostics metadata and change events.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::snapshots::{AccountSnapshot, EntityKind, PortfolioSnapshot};

/// The metadata subset tracked for drift per entity.
///
/// This is never merged: callers supply the complete bag or none at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DiagnosticsSnapshot {
    pub coverage_ratio: Option<f64>,
    pub provenance: Option<String>,
    pub metric_run_uuid: Option<String>,
    pub generated_at: Option<String>,
}

impl DiagnosticsSnapshot {
    pub fn from_account(account: &AccountSnapshot, generated_at: Option<&str>) -> Self {
        Self {
            coverage_ratio: account.coverage_ratio,
            provenance: account.provenance.clone(),
            metric_run_uuid: account.metric_run_uuid.clone(),
            generated_at: generated_at.map(str::to_string),
        }
    }

    /// Falls back to the performance coverage when the portfolio carries none.
    pub fn from_portfolio(portfolio: &PortfolioSnapshot, generated_at: Option<&str>) -> Self {
        let coverage_ratio = portfolio.coverage_ratio.or_else(|| {
            portfolio
                .performance
                .as_ref()
                .and_then(|performance| performance.coverage_ratio)
        });
        Self {
            coverage_ratio,
            provenance: portfolio.provenance.clone(),
            metric_run_uuid: portfolio.metric_run_uuid.clone(),
            generated_at: generated_at.map(str::to_string),
        }
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, value)| value.is_none())
    }

    /// Field names paired with their JSON values, in a stable order.
    pub(crate) fn fields(&self) -> [(&'static str, Option<Value>); 4] {
        [
            ("coverage_ratio", self.coverage_ratio.map(Value::from)),
            ("provenance", self.provenance.clone().map(Value::from)),
            ("metric_run_uuid", self.metric_run_uuid.clone().map(Value::from)),
            ("generated_at", self.generated_at.clone().map(Value::from)),
        ]
    }
}

/// Before/after pair for one changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub previous: Option<Value>,
    pub current: Option<Value>,
}

/// Emitted when diagnostics metadata for an entity changes or is withdrawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsEvent {
    pub kind: EntityKind,
    pub uuid: String,
    /// Delta kind that carried the change (e.g. `portfolio_values`).
    pub source: String,
    pub changed: BTreeMap<String, FieldChange>,
    /// The new metadata; `None` when it was withdrawn.
    pub snapshot: Option<DiagnosticsSnapshot>,
    pub timestamp: DateTime<Utc>,
}

impl DiagnosticsEvent {
    /// True when the event reports withdrawn metadata.
    pub fn is_removal(&self) -> bool {
        self.snapshot.is_none()
    }
}
