//! In-Memory Snapshot Storage Adapter
//!
//! Keeps the buffer snapshots in memory. Clones share the same data, so a
//! test can hand one clone to a buffer and inspect or "restart" from another.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::webhook::WebhookEvent;
use crate::ports::{SnapshotError, SnapshotStorage};

/// In-memory storage for buffer snapshots
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStorage {
    pending: Arc<RwLock<Vec<WebhookEvent>>>,
    processed: Arc<RwLock<Vec<String>>>,
    saves: Arc<AtomicUsize>,
    fail_saves: Arc<AtomicBool>,
}

impl InMemorySnapshotStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail with an IO error
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn pending_snapshot(&self) -> Vec<WebhookEvent> {
        self.pending.read().await.clone()
    }

    pub async fn processed_snapshot(&self) -> Vec<String> {
        self.processed.read().await.clone()
    }

    fn check_writable(&self) -> Result<(), SnapshotError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(SnapshotError::IoError("simulated disk failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStorage for InMemorySnapshotStorage {
    async fn load_pending(&self) -> Result<Vec<WebhookEvent>, SnapshotError> {
        Ok(self.pending.read().await.clone())
    }

    async fn save_pending(&self, events: &[WebhookEvent]) -> Result<(), SnapshotError> {
        self.check_writable()?;
        *self.pending.write().await = events.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_processed(&self) -> Result<Vec<String>, SnapshotError> {
        Ok(self.processed.read().await.clone())
    }

    async fn save_processed(&self, ids: &[String]) -> Result<(), SnapshotError> {
        self.check_writable()?;
        *self.processed.write().await = ids.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
