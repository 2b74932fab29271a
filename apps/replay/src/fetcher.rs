//! Full-snapshot source backed by a JSON file.

use std::path::PathBuf;

use async_trait::async_trait;
use foliosync_core::errors::{Error, Result};
use foliosync_core::reconcile::SnapshotFetcher;
use foliosync_core::snapshots::{AccountSnapshot, PortfolioSnapshot};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    accounts: Vec<AccountSnapshot>,
    #[serde(default)]
    portfolios: Vec<PortfolioSnapshot>,
}

/// Reads `{ "accounts": [...], "portfolios": [...] }` from disk.
pub struct FileSnapshotFetcher {
    path: PathBuf,
}

impl FileSnapshotFetcher {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn load(&self) -> Result<SnapshotFile> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::Fetch(format!("{}: {}", self.path.display(), e)))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[async_trait]
impl SnapshotFetcher for FileSnapshotFetcher {
    async fn fetch_accounts(&self) -> Result<Vec<AccountSnapshot>> {
        Ok(self.load().await?.accounts)
    }

    async fn fetch_portfolios(&self) -> Result<Vec<PortfolioSnapshot>> {
        Ok(self.load().await?.portfolios)
    }
}
