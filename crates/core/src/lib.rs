//! Foliosync Core - Snapshot reconciliation for live portfolio dashboards.
//!
//! This crate folds incremental account, portfolio and position deltas into
//! canonical snapshots and delivers the reconciled state to a presentation
//! surface that may not be ready to receive it yet. It owns no I/O; hosts
//! feed envelopes in and implement `PresentationSurface` and
//! `DiagnosticsSink` on their side.

pub mod chunks;
pub mod constants;
pub mod diagnostics;
pub mod errors;
pub mod positions;
pub mod reconcile;
pub mod snapshots;

// Re-export the engine entry points
pub use reconcile::{DeltaEnvelope, Reconciler, ReconcilerConfig};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
