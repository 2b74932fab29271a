//! Core error types for foliosync.
//!
//! Errors never cross the delta ingress: `Reconciler::observe_delta` turns
//! them into an `IngestOutcome`. They surface only from the fetch path.

use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    #[error("Snapshot fetch failed: {0}")]
    Fetch(String),
}
