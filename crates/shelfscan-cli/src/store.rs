//! Directory-backed debug artifacts and the failed-target log.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfscan_scraper::{ArtifactStore, ScraperError};
use tokio::sync::Mutex;

pub(crate) const FAILED_TARGETS_KEY: &str = "failed-targets.json";

/// Writes each artifact to its own file under `dir`. Keys passed through
/// [`ArtifactStore::put`] get a UTC timestamp prefix so repeated captures
/// for the same target never overwrite each other.
pub(crate) struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    pub(crate) async fn create(dir: &Path) -> Result<Self, ScraperError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| ScraperError::Io {
                context: dir.display().to_string(),
                source,
            })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    /// Write `bytes` under exactly `name`, replacing any previous content.
    pub(crate) async fn write_named(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ScraperError> {
        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| ScraperError::Io {
                context: path.display().to_string(),
                source,
            })?;
        Ok(path)
    }
}

fn timestamped(key: &str, now: DateTime<Utc>) -> String {
    format!("{}-{key}", now.format("%Y%m%dT%H%M%S%.3fZ"))
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), ScraperError> {
        let name = timestamped(key, Utc::now());
        let path = self.write_named(&name, &bytes).await?;
        tracing::info!(path = %path.display(), content_type, bytes = bytes.len(), "stored debug artifact");
        Ok(())
    }
}

/// A target that exhausted its attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FailedTarget {
    pub url: String,
    pub search_term: Option<String>,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

/// Append-only list of failed targets, mirrored to
/// [`FAILED_TARGETS_KEY`] in the store after every append.
pub(crate) struct FailureLog {
    entries: Mutex<Vec<FailedTarget>>,
    store: Option<Arc<FsArtifactStore>>,
}

impl FailureLog {
    pub(crate) fn new(store: Option<Arc<FsArtifactStore>>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            store,
        }
    }

    pub(crate) async fn push(&self, failed: FailedTarget) {
        let mut entries = self.entries.lock().await;
        entries.push(failed);

        let Some(store) = &self.store else {
            return;
        };
        match serde_json::to_vec_pretty(&*entries) {
            Ok(bytes) => {
                if let Err(e) = store.write_named(FAILED_TARGETS_KEY, &bytes).await {
                    tracing::warn!(error = %e, "could not persist failed targets");
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not serialize failed targets"),
        }
    }

    pub(crate) async fn snapshot(&self) -> Vec<FailedTarget> {
        self.entries.lock().await.clone()
    }
}
