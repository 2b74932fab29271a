//! Reconcile module - the orchestrator tying store, cache, chunk reassembly
//! and diagnostics to the presentation surface.

mod config;
mod driver;
mod envelope;
mod reconciler;
mod retry;
mod surface;

pub use config::ReconcilerConfig;
pub use driver::run_reconciler;
pub use envelope::*;
pub use reconciler::*;
pub use retry::RetrySchedule;
pub use surface::*;
