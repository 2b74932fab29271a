//! Headless presentation surface that logs what a dashboard would render.

use std::collections::HashSet;

use foliosync_core::reconcile::{PositionsUpdate, PresentationSurface, TargetState};
use foliosync_core::snapshots::{AccountSnapshot, PortfolioSnapshot};

use crate::config::ExpandedSet;

/// A portfolio's detail container exists once its overview row has been
/// rendered; it is visible when the portfolio is in the expanded set.
pub struct HeadlessSurface {
    expanded: ExpandedSet,
    rows: HashSet<String>,
    rendered_positions: usize,
}

impl HeadlessSurface {
    pub fn new(expanded: ExpandedSet) -> Self {
        Self {
            expanded,
            rows: HashSet::new(),
            rendered_positions: 0,
        }
    }

    pub fn rendered_positions(&self) -> usize {
        self.rendered_positions
    }
}

impl PresentationSurface for HeadlessSurface {
    fn target_state(&self, portfolio_id: &str) -> TargetState {
        if !self.rows.contains(portfolio_id) {
            TargetState::Absent
        } else if self.expanded.contains(portfolio_id) {
            TargetState::Visible
        } else {
            TargetState::Collapsed
        }
    }

    fn render_positions(&mut self, portfolio_id: &str, update: &PositionsUpdate) {
        self.rendered_positions += 1;
        match update {
            PositionsUpdate::Positions(positions) => {
                tracing::info!(
                    portfolio = portfolio_id,
                    positions = positions.len(),
                    "Rendered positions"
                );
                for position in positions {
                    tracing::debug!(
                        portfolio = portfolio_id,
                        security = %position.security_uuid,
                        holdings = %position.current_holdings,
                        current_value = ?position.current_value,
                        "Position row"
                    );
                }
            }
            PositionsUpdate::Error(message) => {
                tracing::warn!(portfolio = portfolio_id, "Rendered positions error: {}", message);
            }
        }
    }

    fn render_account_rows(&mut self, accounts: &[AccountSnapshot]) {
        for account in accounts {
            tracing::debug!(
                account = %account.uuid,
                balance = ?account.balance,
                fx_unavailable = account.fx_unavailable,
                "Account row"
            );
        }
        tracing::info!("Rendered {} account row(s)", accounts.len());
    }

    fn render_portfolio_rows(&mut self, portfolios: &[PortfolioSnapshot]) {
        for portfolio in portfolios {
            self.rows.insert(portfolio.uuid.clone());
            tracing::debug!(
                portfolio = %portfolio.uuid,
                current_value = ?portfolio.current_value,
                purchase_sum = ?portfolio.purchase_sum,
                "Portfolio row"
            );
        }
        tracing::info!("Rendered {} portfolio row(s)", portfolios.len());
    }
}
