//! Snapshot Storage Port - Persistence for the buffer and processed ids.
//!
//! Two documents: the pending-events list and the processed-id list. Each
//! save replaces the whole document.

use async_trait::async_trait;

use crate::domain::webhook::WebhookEvent;

/// Errors that can occur during snapshot operations
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to serialize snapshot: {0}")]
    SerializationFailed(String),

    #[error("Failed to deserialize snapshot: {0}")]
    DeserializationFailed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Port for persisting buffer and idempotency snapshots
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Load buffered events. Missing document yields an empty list.
    async fn load_pending(&self) -> Result<Vec<WebhookEvent>, SnapshotError>;

    /// Replace the buffered events document.
    async fn save_pending(&self, events: &[WebhookEvent]) -> Result<(), SnapshotError>;

    /// Load processed fingerprints, oldest first. Missing document yields an empty list.
    async fn load_processed(&self) -> Result<Vec<String>, SnapshotError>;

    /// Replace the processed fingerprints document.
    async fn save_processed(&self, ids: &[String]) -> Result<(), SnapshotError>;
}
