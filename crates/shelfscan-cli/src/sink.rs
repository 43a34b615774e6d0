//! Newline-delimited JSON record output.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shelfscan_core::ProductRecord;
use shelfscan_scraper::{RecordSink, ScraperError};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends each batch as JSON lines to one file. Batches from concurrent
/// workers never interleave.
pub(crate) struct JsonlSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlSink {
    /// Open `path` for appending, creating it and its parent directories.
    pub(crate) async fn create(path: &Path) -> Result<Self, ScraperError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| io_error(path, source))?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ScraperError {
    ScraperError::Io {
        context: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl RecordSink for JsonlSink {
    async fn append(&self, records: &[ProductRecord]) -> Result<(), ScraperError> {
        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)
                .map_err(|e| io_error(&self.path, std::io::Error::other(e)))?;
            buf.push(b'\n');
        }

        let mut file = self.file.lock().await;
        file.write_all(&buf)
            .await
            .map_err(|source| io_error(&self.path, source))?;
        file.flush()
            .await
            .map_err(|source| io_error(&self.path, source))?;
        tracing::debug!(path = %self.path.display(), count = records.len(), "appended records");
        Ok(())
    }
}
