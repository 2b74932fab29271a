//! Presentation and fetch collaborators consumed by the reconciler.

use async_trait::async_trait;

use crate::errors::Result;
use crate::snapshots::{AccountSnapshot, PortfolioSnapshot, PositionSnapshot};

/// Where the detail container for a portfolio currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Not built yet.
    Absent,
    /// Built but collapsed.
    Collapsed,
    Visible,
}

/// What gets rendered into a portfolio's detail container.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionsUpdate {
    Positions(Vec<PositionSnapshot>),
    /// Upstream reported an error for this portfolio.
    Error(String),
}

impl PositionsUpdate {
    pub fn is_error(&self) -> bool {
        matches!(self, PositionsUpdate::Error(_))
    }
}

/// The rendered dashboard, as far as the reconciler needs to see it.
///
/// Markup and formatting stay with the implementation; the reconciler only
/// asks whether a target exists and hands it data.
pub trait PresentationSurface {
    fn target_state(&self, portfolio_id: &str) -> TargetState;

    /// Only called when `target_state` reported `Visible`.
    fn render_positions(&mut self, portfolio_id: &str, update: &PositionsUpdate);

    fn render_account_rows(&mut self, _accounts: &[AccountSnapshot]) {}

    fn render_portfolio_rows(&mut self, _portfolios: &[PortfolioSnapshot]) {}
}

/// Source of full snapshots used to warm the store on initial load.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch_accounts(&self) -> Result<Vec<AccountSnapshot>>;

    async fn fetch_portfolios(&self) -> Result<Vec<PortfolioSnapshot>>;
}
