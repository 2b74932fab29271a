//! Orchestrates delta ingestion, presentation apply and deferred retries.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::time::Instant;

use super::config::ReconcilerConfig;
use super::envelope::{DeltaEnvelope, DeltaKind};
use super::retry::RetrySchedule;
use super::surface::{PositionsUpdate, PresentationSurface, SnapshotFetcher, TargetState};
use crate::chunks::ChunkBuffer;
use crate::diagnostics::{DiagnosticsDiffer, DiagnosticsEvent, DiagnosticsSink, DiagnosticsSnapshot};
use crate::errors::Result;
use crate::positions::PositionCache;
use crate::snapshots::{
    merge_positions, AccountSnapshot, EntityKind, PortfolioPatch, PortfolioSnapshot,
    PositionPatch, PositionSnapshot, SnapshotStore,
};

/// Classification of one attempt to render a positions update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Rendered into the target container.
    Applied,
    /// No surface attached or no identifier. Never retried.
    Invalid,
    /// The surface exists but the target container does not (yet).
    Missing,
    /// The target exists but is collapsed.
    Hidden,
}

impl ApplyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyOutcome::Applied => "applied",
            ApplyOutcome::Invalid => "invalid",
            ApplyOutcome::Missing => "missing",
            ApplyOutcome::Hidden => "hidden",
        }
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What `observe_delta` did with an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Account or portfolio patches were merged into the store.
    Merged { kind: DeltaKind, count: usize },
    /// A chunk was buffered; nothing to apply yet.
    Buffered { portfolio_id: String },
    /// A positions update (data or error) went through presentation apply.
    Positions {
        portfolio_id: String,
        outcome: ApplyOutcome,
        queued: bool,
    },
    /// Upstream flagged an account/portfolio delta as failed; nothing merged.
    UpstreamError { kind: DeltaKind },
    /// The payload could not be decoded or lacked an identifier.
    Rejected { kind: DeltaKind },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub applied: usize,
    pub still_pending: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub attempted: usize,
    pub applied: usize,
    pub abandoned: usize,
}

/// Top-level reconciliation engine.
///
/// Owns every piece of mutable state (store, cache, chunk buffers, differ,
/// pending map, retry timers) and is driven from a single task.
pub struct Reconciler<S: PresentationSurface> {
    config: ReconcilerConfig,
    store: SnapshotStore,
    cache: PositionCache,
    chunks: ChunkBuffer<PositionPatch>,
    differ: DiagnosticsDiffer,
    pending: HashMap<String, PositionsUpdate>,
    retries: RetrySchedule,
    surface: Option<S>,
    sink: Arc<dyn DiagnosticsSink>,
}

impl<S: PresentationSurface> Reconciler<S> {
    pub fn new(config: ReconcilerConfig, sink: Arc<dyn DiagnosticsSink>) -> Self {
        let retries = RetrySchedule::new(config.retry_interval, config.max_retry_attempts);
        Self {
            config,
            store: SnapshotStore::new(),
            cache: PositionCache::new(),
            chunks: ChunkBuffer::new(),
            differ: DiagnosticsDiffer::new(),
            pending: HashMap::new(),
            retries,
            surface: None,
            sink,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    // ==================== Surface lifecycle ====================

    /// Attaches a freshly built surface and sweeps pending updates into it.
    pub fn attach(&mut self, surface: S) -> FlushSummary {
        self.surface = Some(surface);
        self.flush_pending()
    }

    /// Detaches the surface and resets all reconciliation state.
    pub fn detach(&mut self) -> Option<S> {
        info!(
            "Detaching surface, discarding {} pending update(s)",
            self.pending.len()
        );
        self.store.reset();
        self.cache.clear_all();
        self.chunks.clear();
        self.differ.reset();
        self.pending.clear();
        self.retries.clear();
        self.surface.take()
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    // ==================== Full sync ====================

    /// Replaces both entity families from a full snapshot.
    ///
    /// Embedded positions refresh the cache only where it is already warm.
    pub fn load_snapshot(
        &mut self,
        accounts: Vec<AccountSnapshot>,
        portfolios: Vec<PortfolioSnapshot>,
    ) {
        let portfolios: Vec<PortfolioSnapshot> =
            portfolios.into_iter().map(PortfolioSnapshot::normalize).collect();

        for portfolio in &portfolios {
            if let Some(positions) = &portfolio.positions {
                if self.cache.has(&portfolio.uuid) {
                    self.cache.set(&portfolio.uuid, positions.clone());
                }
            }
        }

        self.store.accounts_mut().replace(accounts);
        self.store.portfolios_mut().replace(portfolios);

        let accounts = self.store.accounts().get_all();
        let portfolios = self.store.portfolios().get_all();
        info!(
            "Loaded full snapshot: {} account(s), {} portfolio(s)",
            accounts.len(),
            portfolios.len()
        );

        let mut events = self.observe_accounts(&accounts, None, "snapshot");
        events.extend(self.observe_portfolios(&portfolios, None, "snapshot"));
        self.emit(events);

        if let Some(surface) = self.surface.as_mut() {
            surface.render_account_rows(&accounts);
            surface.render_portfolio_rows(&portfolios);
        }
    }

    /// Fetches a full snapshot through `fetcher` and loads it.
    pub async fn warm_from(&mut self, fetcher: &dyn SnapshotFetcher) -> Result<()> {
        let accounts = fetcher.fetch_accounts().await?;
        let portfolios = fetcher.fetch_portfolios().await?;
        self.load_snapshot(accounts, portfolios);
        Ok(())
    }

    // ==================== Ingress ====================

    /// Single entry point for deltas from the event bus. Never fails.
    pub fn observe_delta(&mut self, envelope: DeltaEnvelope) -> IngestOutcome {
        match envelope.kind {
            DeltaKind::Accounts => self.ingest_accounts(&envelope),
            DeltaKind::PortfolioValues => self.ingest_portfolio_values(&envelope),
            DeltaKind::PortfolioPositions => self.ingest_positions(envelope),
        }
    }

    fn ingest_accounts(&mut self, envelope: &DeltaEnvelope) -> IngestOutcome {
        let kind = envelope.kind;
        if let Some(error) = &envelope.error {
            warn!("Upstream error for {} delta: {}", kind, error);
            return IngestOutcome::UpstreamError { kind };
        }
        let patches = match envelope.decode_accounts() {
            Ok(patches) => patches,
            Err(err) => {
                warn!("Rejecting {} delta: {}", kind, err);
                return IngestOutcome::Rejected { kind };
            }
        };

        let merged = self.store.accounts_mut().merge(&patches);
        let events =
            self.observe_accounts(&merged, envelope.generated_at.as_deref(), kind.as_str());
        self.emit(events);

        if let Some(surface) = self.surface.as_mut() {
            surface.render_account_rows(&merged);
        }
        IngestOutcome::Merged {
            kind,
            count: merged.len(),
        }
    }

    fn ingest_portfolio_values(&mut self, envelope: &DeltaEnvelope) -> IngestOutcome {
        let kind = envelope.kind;
        if let Some(error) = &envelope.error {
            warn!("Upstream error for {} delta: {}", kind, error);
            return IngestOutcome::UpstreamError { kind };
        }
        let patches = match envelope.decode_portfolio_values() {
            Ok(patches) => patches,
            Err(err) => {
                warn!("Rejecting {} delta: {}", kind, err);
                return IngestOutcome::Rejected { kind };
            }
        };

        let merged = self.store.portfolios_mut().merge(&patches);

        for patch in &patches {
            if let Some(positions) = &patch.positions {
                if self.cache.has(&patch.uuid) {
                    self.cache.merge_patch(&patch.uuid, positions);
                }
            }
        }

        let events =
            self.observe_portfolios(&merged, envelope.generated_at.as_deref(), kind.as_str());
        self.emit(events);

        if let Some(surface) = self.surface.as_mut() {
            surface.render_portfolio_rows(&merged);
        }
        IngestOutcome::Merged {
            kind,
            count: merged.len(),
        }
    }

    fn ingest_positions(&mut self, envelope: DeltaEnvelope) -> IngestOutcome {
        let kind = envelope.kind;
        let payload = match envelope.decode_positions() {
            Ok(payload) => payload,
            Err(err) => {
                warn!("Rejecting {} delta: {}", kind, err);
                return IngestOutcome::Rejected { kind };
            }
        };
        let portfolio_id = payload.portfolio_uuid;

        if let Some(error) = envelope.error.or(payload.error) {
            if self.chunks.discard(&portfolio_id) {
                debug!("Error for {} discarded partial chunk sequence", portfolio_id);
            }
            return self.deliver(&portfolio_id, PositionsUpdate::Error(error));
        }

        let Some(patches) = self.chunks.merge_chunk(
            &portfolio_id,
            envelope.chunk_index,
            envelope.chunk_count,
            payload.positions,
        ) else {
            return IngestOutcome::Buffered { portfolio_id };
        };

        if self.store.portfolios().contains(&portfolio_id) {
            let patch = PortfolioPatch {
                uuid: portfolio_id.clone(),
                positions: Some(patches.clone()),
                ..Default::default()
            };
            self.store.portfolios_mut().merge(&[patch]);
        }

        let positions = if self.cache.has(&portfolio_id) {
            self.cache.merge_patch(&portfolio_id, &patches)
        } else {
            let mut positions = Vec::new();
            merge_positions(&mut positions, &patches);
            positions
        };

        self.deliver(&portfolio_id, PositionsUpdate::Positions(positions))
    }

    // ==================== Presentation apply ====================

    fn deliver(&mut self, portfolio_id: &str, update: PositionsUpdate) -> IngestOutcome {
        let outcome = self.try_apply(portfolio_id, &update);
        let queued = self.settle(portfolio_id, update, outcome);
        IngestOutcome::Positions {
            portfolio_id: portfolio_id.to_string(),
            outcome,
            queued,
        }
    }

    fn try_apply(&mut self, portfolio_id: &str, update: &PositionsUpdate) -> ApplyOutcome {
        if portfolio_id.is_empty() {
            return ApplyOutcome::Invalid;
        }
        let Some(surface) = self.surface.as_mut() else {
            return ApplyOutcome::Invalid;
        };
        match surface.target_state(portfolio_id) {
            TargetState::Absent => ApplyOutcome::Missing,
            TargetState::Collapsed => ApplyOutcome::Hidden,
            TargetState::Visible => {
                surface.render_positions(portfolio_id, update);
                ApplyOutcome::Applied
            }
        }
    }

    /// Updates pending state for `outcome`. Returns whether the update is queued.
    fn settle(
        &mut self,
        portfolio_id: &str,
        update: PositionsUpdate,
        outcome: ApplyOutcome,
    ) -> bool {
        match outcome {
            ApplyOutcome::Applied => {
                self.clear_pending(portfolio_id);
                if let PositionsUpdate::Positions(positions) = update {
                    if !self.cache.has(portfolio_id) {
                        self.cache.set(portfolio_id, positions);
                    }
                }
                false
            }
            ApplyOutcome::Invalid => {
                debug!("Dropping update for '{}': no addressable target", portfolio_id);
                self.clear_pending(portfolio_id);
                false
            }
            ApplyOutcome::Missing => {
                self.queue(portfolio_id, update);
                true
            }
            ApplyOutcome::Hidden => {
                if update.is_error() || self.cache.has(portfolio_id) {
                    self.queue(portfolio_id, update);
                    true
                } else {
                    debug!(
                        "Dropping update for collapsed portfolio {} without cached positions",
                        portfolio_id
                    );
                    self.clear_pending(portfolio_id);
                    false
                }
            }
        }
    }

    fn queue(&mut self, portfolio_id: &str, update: PositionsUpdate) {
        self.pending.insert(portfolio_id.to_string(), update);
        if self.retries.arm(portfolio_id) {
            debug!("Queued update for {}, retry armed", portfolio_id);
        }
    }

    fn clear_pending(&mut self, portfolio_id: &str) {
        self.pending.remove(portfolio_id);
        self.retries.cancel(portfolio_id);
    }

    // ==================== Retry ====================

    /// Earliest retry deadline, if any update is pending.
    pub fn next_retry_at(&self) -> Option<Instant> {
        self.retries.next_deadline()
    }

    /// Fires every retry timer that is due.
    pub fn run_due_retries(&mut self) -> RetrySummary {
        let now = Instant::now();
        let mut summary = RetrySummary::default();

        for portfolio_id in self.retries.due_ids(now) {
            let Some(update) = self.pending.get(&portfolio_id).cloned() else {
                self.retries.cancel(&portfolio_id);
                continue;
            };
            let Some(attempt) = self.retries.begin_attempt(&portfolio_id) else {
                self.abandon(&portfolio_id);
                summary.abandoned += 1;
                continue;
            };

            summary.attempted += 1;
            let outcome = self.try_apply(&portfolio_id, &update);
            debug!(
                "Retry {}/{} for {}: {}",
                attempt, self.config.max_retry_attempts, portfolio_id, outcome
            );
            if outcome == ApplyOutcome::Applied {
                summary.applied += 1;
            }

            if self.settle(&portfolio_id, update, outcome) {
                if self.retries.is_exhausted(attempt) {
                    self.abandon(&portfolio_id);
                    summary.abandoned += 1;
                } else {
                    self.retries.rearm(&portfolio_id, now);
                }
            }
        }
        summary
    }

    fn abandon(&mut self, portfolio_id: &str) {
        debug!("Abandoning pending update for {} after retries", portfolio_id);
        self.clear_pending(portfolio_id);
    }

    /// Attempts every pending update once, without consuming retry attempts.
    ///
    /// Meant for right after the surface has been fully (re)built.
    pub fn flush_pending(&mut self) -> FlushSummary {
        let mut ids: Vec<String> = self.pending.keys().cloned().collect();
        ids.sort();

        let mut summary = FlushSummary::default();
        for portfolio_id in ids {
            let Some(update) = self.pending.get(&portfolio_id).cloned() else {
                continue;
            };
            let outcome = self.try_apply(&portfolio_id, &update);
            if self.settle(&portfolio_id, update, outcome) {
                summary.still_pending += 1;
            } else if outcome == ApplyOutcome::Applied {
                summary.applied += 1;
            } else {
                summary.dropped += 1;
            }
        }
        if summary != FlushSummary::default() {
            debug!("Flushed pending updates: {:?}", summary);
        }
        summary
    }

    pub fn pending_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.pending.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_pending(&self, portfolio_id: &str) -> bool {
        self.pending.contains_key(portfolio_id)
    }

    pub fn pending_update(&self, portfolio_id: &str) -> Option<PositionsUpdate> {
        self.pending.get(portfolio_id).cloned()
    }

    pub fn retry_attempts(&self, portfolio_id: &str) -> Option<u32> {
        self.retries.attempts(portfolio_id)
    }

    // ==================== Diagnostics ====================

    fn observe_accounts(
        &mut self,
        accounts: &[AccountSnapshot],
        generated_at: Option<&str>,
        source: &str,
    ) -> Vec<DiagnosticsEvent> {
        accounts
            .iter()
            .filter_map(|account| {
                let snapshot = DiagnosticsSnapshot::from_account(account, generated_at);
                self.differ
                    .observe(EntityKind::Account, &account.uuid, Some(snapshot), source)
            })
            .collect()
    }

    fn observe_portfolios(
        &mut self,
        portfolios: &[PortfolioSnapshot],
        generated_at: Option<&str>,
        source: &str,
    ) -> Vec<DiagnosticsEvent> {
        portfolios
            .iter()
            .filter_map(|portfolio| {
                let snapshot = DiagnosticsSnapshot::from_portfolio(portfolio, generated_at);
                self.differ
                    .observe(EntityKind::Portfolio, &portfolio.uuid, Some(snapshot), source)
            })
            .collect()
    }

    fn emit(&self, events: Vec<DiagnosticsEvent>) {
        if !events.is_empty() {
            self.sink.report(&events);
        }
    }

    // ==================== Read accessors ====================

    pub fn get_account(&self, uuid: &str) -> Option<AccountSnapshot> {
        self.store.accounts().get(uuid)
    }

    pub fn get_all_accounts(&self) -> Vec<AccountSnapshot> {
        self.store.accounts().get_all()
    }

    pub fn get_portfolio(&self, uuid: &str) -> Option<PortfolioSnapshot> {
        self.store.portfolios().get(uuid)
    }

    pub fn get_all_portfolios(&self) -> Vec<PortfolioSnapshot> {
        self.store.portfolios().get_all()
    }

    pub fn get_cached_positions(&self, portfolio_id: &str) -> Option<Vec<PositionSnapshot>> {
        self.cache.get(portfolio_id)
    }

    /// Drops the cached positions for a portfolio, making it cold again.
    pub fn invalidate_cached_positions(&mut self, portfolio_id: &str) {
        self.cache.clear(portfolio_id);
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn chunk_buffer(&self) -> &ChunkBuffer<PositionPatch> {
        &self.chunks
    }
}
