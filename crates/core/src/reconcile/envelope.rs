//! Inbound delta envelope and payload decoding.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Error, Result};
use crate::snapshots::{AccountPatch, PortfolioPatch, PositionPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaKind {
    Accounts,
    PortfolioValues,
    PortfolioPositions,
}

impl DeltaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaKind::Accounts => "accounts",
            DeltaKind::PortfolioValues => "portfolio_values",
            DeltaKind::PortfolioPositions => "portfolio_positions",
        }
    }
}

impl fmt::Display for DeltaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message from the event bus.
///
/// The payload stays raw JSON until the kind-specific decoder runs, so a
/// malformed payload can be rejected without failing envelope parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaEnvelope {
    pub kind: DeltaKind,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

/// Payload of a `portfolio_positions` delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PositionsPayload {
    #[serde(default)]
    pub portfolio_uuid: String,
    #[serde(default)]
    pub positions: Vec<PositionPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeltaEnvelope {
    pub fn new(kind: DeltaKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            error: None,
            chunk_index: None,
            chunk_count: None,
            generated_at: None,
        }
    }

    pub fn accounts(patches: Vec<AccountPatch>) -> Self {
        Self::new(
            DeltaKind::Accounts,
            serde_json::to_value(patches).unwrap_or(Value::Null),
        )
    }

    pub fn portfolio_values(patches: Vec<PortfolioPatch>) -> Self {
        Self::new(
            DeltaKind::PortfolioValues,
            serde_json::to_value(patches).unwrap_or(Value::Null),
        )
    }

    pub fn portfolio_positions(portfolio_uuid: &str, positions: Vec<PositionPatch>) -> Self {
        let payload = PositionsPayload {
            portfolio_uuid: portfolio_uuid.to_string(),
            positions,
            error: None,
        };
        Self::new(
            DeltaKind::PortfolioPositions,
            serde_json::to_value(payload).unwrap_or(Value::Null),
        )
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_chunk(mut self, index: u32, count: u32) -> Self {
        self.chunk_index = Some(index);
        self.chunk_count = Some(count);
        self
    }

    pub fn with_generated_at(mut self, generated_at: impl Into<String>) -> Self {
        self.generated_at = Some(generated_at.into());
        self
    }

    pub fn decode_accounts(&self) -> Result<Vec<AccountPatch>> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    pub fn decode_portfolio_values(&self) -> Result<Vec<PortfolioPatch>> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Decodes a positions payload, requiring a non-empty `portfolio_uuid`.
    pub fn decode_positions(&self) -> Result<PositionsPayload> {
        let payload: PositionsPayload = serde_json::from_value(self.payload.clone())?;
        if payload.portfolio_uuid.is_empty() {
            return Err(Error::MissingField("portfolio_uuid".to_string()));
        }
        Ok(payload)
    }
}
