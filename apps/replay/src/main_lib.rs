use std::sync::Arc;

use anyhow::Context;
use foliosync_core::reconcile::{run_reconciler, DeltaEnvelope, Reconciler, ReconcilerConfig};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{Config, InputSource};
use crate::diagnostics_sink::TracingDiagnosticsSink;
use crate::fetcher::FileSnapshotFetcher;
use crate::surface::HeadlessSurface;

pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub fn build_reconciler(config: &Config) -> Reconciler<HeadlessSurface> {
    let reconciler_config = ReconcilerConfig::default()
        .with_retry_interval(config.retry_interval)
        .with_max_retry_attempts(config.max_retry_attempts);
    let mut reconciler = Reconciler::new(reconciler_config, Arc::new(TracingDiagnosticsSink));
    reconciler.attach(HeadlessSurface::new(config.expanded.clone()));
    reconciler
}

async fn open_input(input: &InputSource) -> anyhow::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    Ok(match input {
        InputSource::Stdin => Box::new(BufReader::new(tokio::io::stdin())),
        InputSource::File(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
    })
}

/// Forwards every decodable line of `reader` to `tx`.
///
/// Blank lines are skipped and undecodable ones logged; returns the number of
/// envelopes sent.
pub async fn forward_envelopes<R>(
    reader: R,
    tx: mpsc::UnboundedSender<DeltaEnvelope>,
) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let mut sent = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<DeltaEnvelope>(&line) {
            Ok(envelope) => {
                if tx.send(envelope).is_err() {
                    tracing::warn!("Reconciler stopped before input was exhausted");
                    break;
                }
                sent += 1;
            }
            Err(e) => tracing::warn!("Skipping line {}: {}", line_no, e),
        }
    }
    Ok(sent)
}

pub async fn run(config: &Config) -> anyhow::Result<()> {
    let mut reconciler = build_reconciler(config);

    if let Some(path) = &config.snapshot_path {
        let fetcher = FileSnapshotFetcher::new(path.clone());
        reconciler
            .warm_from(&fetcher)
            .await
            .context("Failed to load initial snapshot")?;
    }

    let reader = open_input(&config.input).await?;
    let (tx, rx) = mpsc::unbounded_channel();
    let forwarder = tokio::spawn(forward_envelopes(reader, tx));
    let reconciler = run_reconciler(reconciler, rx).await;
    let sent = forwarder.await??;

    let rendered = reconciler
        .surface()
        .map(HeadlessSurface::rendered_positions)
        .unwrap_or_default();
    tracing::info!(
        "Replayed {} envelope(s): {} accounts, {} portfolios, {} renders, {} pending",
        sent,
        reconciler.get_all_accounts().len(),
        reconciler.get_all_portfolios().len(),
        rendered,
        reconciler.pending_ids().len()
    );
    let stalled = reconciler.chunk_buffer().pending_parents();
    if !stalled.is_empty() {
        tracing::warn!("Incomplete chunk sequences at end of input: {:?}", stalled);
    }
    Ok(())
}
