use std::time::Duration;

use crate::constants::{DEFAULT_MAX_RETRY_ATTEMPTS, DEFAULT_RETRY_INTERVAL_MS};

/// Retry policy for pending position updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub retry_interval: Duration,
    pub max_retry_attempts: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS),
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
        }
    }
}

impl ReconcilerConfig {
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_max_retry_attempts(mut self, max_retry_attempts: u32) -> Self {
        self.max_retry_attempts = max_retry_attempts;
        self
    }
}
