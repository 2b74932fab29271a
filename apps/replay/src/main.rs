mod config;
mod diagnostics_sink;
mod fetcher;
mod main_lib;
mod surface;

use config::Config;
use main_lib::{init_tracing, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();
    init_tracing(&config.log_format);
    tracing::info!(
        "Starting replay (retry every {:?}, up to {} attempt(s))",
        config.retry_interval,
        config.max_retry_attempts
    );
    run(&config).await
}
