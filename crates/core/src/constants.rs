/// Delay between retries of a pending position update.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 500;

/// Retries attempted before a pending update is abandoned.
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 5;
