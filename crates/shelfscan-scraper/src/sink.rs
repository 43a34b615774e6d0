//! Where finished records and debug artifacts go.

use async_trait::async_trait;
use shelfscan_core::ProductRecord;

use crate::error::ScraperError;

/// Append-only destination for extracted records. Implementations must accept
/// concurrent `append` calls from several page sessions.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append(&self, records: &[ProductRecord]) -> Result<(), ScraperError>;
}

/// Best-effort key-value storage for screenshots, HTML snapshots, and the
/// failed-target list.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), ScraperError>;
}
