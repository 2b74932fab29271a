//! Async loop feeding envelopes and retry timers into a reconciler.

use log::{debug, info};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

use super::envelope::DeltaEnvelope;
use super::reconciler::Reconciler;
use super::surface::PresentationSurface;

/// Runs `reconciler` until the envelope channel closes.
///
/// Envelopes are handled to completion one at a time; between them the loop
/// sleeps until the next retry deadline. On shutdown pending updates are
/// flushed once and the reconciler is handed back.
pub async fn run_reconciler<S: PresentationSurface>(
    mut reconciler: Reconciler<S>,
    mut rx: mpsc::UnboundedReceiver<DeltaEnvelope>,
) -> Reconciler<S> {
    info!("Reconciler loop started");

    loop {
        let next_retry = reconciler.next_retry_at();
        tokio::select! {
            envelope = rx.recv() => {
                match envelope {
                    Some(envelope) => {
                        let outcome = reconciler.observe_delta(envelope);
                        debug!("Delta handled: {:?}", outcome);
                    }
                    None => {
                        let summary = reconciler.flush_pending();
                        info!(
                            "Reconciler loop stopped: {} flushed, {} still pending",
                            summary.applied, summary.still_pending
                        );
                        return reconciler;
                    }
                }
            }
            _ = sleep_until_deadline(next_retry) => {
                let summary = reconciler.run_due_retries();
                debug!("Retry tick: {:?}", summary);
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
