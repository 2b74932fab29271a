use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use foliosync_core::constants::{DEFAULT_MAX_RETRY_ATTEMPTS, DEFAULT_RETRY_INTERVAL_MS};

/// Where envelopes are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "-" => InputSource::Stdin,
            path => InputSource::File(PathBuf::from(path)),
        }
    }
}

/// Portfolios whose detail view counts as expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandedSet {
    All,
    Only(HashSet<String>),
}

impl ExpandedSet {
    pub fn parse(raw: &str) -> Self {
        if raw.trim() == "*" {
            return ExpandedSet::All;
        }
        ExpandedSet::Only(
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, portfolio_id: &str) -> bool {
        match self {
            ExpandedSet::All => true,
            ExpandedSet::Only(ids) => ids.contains(portfolio_id),
        }
    }
}

pub struct Config {
    pub input: InputSource,
    pub snapshot_path: Option<PathBuf>,
    pub retry_interval: Duration,
    pub max_retry_attempts: u32,
    pub expanded: ExpandedSet,
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let input = InputSource::parse(&std::env::var("FOLIOSYNC_INPUT").unwrap_or_default());
        let snapshot_path = std::env::var("FOLIOSYNC_SNAPSHOT")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let retry_ms: u64 = std::env::var("FOLIOSYNC_RETRY_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RETRY_INTERVAL_MS);
        let max_retry_attempts: u32 = std::env::var("FOLIOSYNC_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_RETRY_ATTEMPTS);
        let expanded = ExpandedSet::parse(&std::env::var("FOLIOSYNC_EXPANDED").unwrap_or_default());
        let log_format =
            std::env::var("FOLIOSYNC_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
        Self {
            input,
            snapshot_path,
            retry_interval: Duration::from_millis(retry_ms),
            max_retry_attempts,
            expanded,
            log_format,
        }
    }
}
