//! File-based Snapshot Storage Adapter
//!
//! Stores the pending-events list and the processed-id list as JSON files
//! in one directory. Writes go to a temp file that is renamed over the
//! target, so a crash mid-write leaves the previous snapshot intact.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::webhook::WebhookEvent;
use crate::ports::{SnapshotError, SnapshotStorage};

const PENDING_FILE: &str = "pending-events.json";
const PROCESSED_FILE: &str = "processed-ids.json";

/// File-based storage for buffer snapshots
#[derive(Debug, Clone)]
pub struct FileSnapshotStorage {
    base_path: PathBuf,
}

impl FileSnapshotStorage {
    /// Create a new file storage rooted at `base_path`
    ///
    /// # Example
    /// ```ignore
    /// let storage = FileSnapshotStorage::new("./data/webhook-buffer");
    /// ```
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn pending_path(&self) -> PathBuf {
        self.base_path.join(PENDING_FILE)
    }

    pub fn processed_path(&self) -> PathBuf {
        self.base_path.join(PROCESSED_FILE)
    }

    /// Ensure directory exists
    async fn ensure_dir(&self) -> Result<(), SnapshotError> {
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| SnapshotError::IoError(e.to_string()))
    }

    async fn write_json<T: Serialize + ?Sized>(
        &self,
        path: &Path,
        value: &T,
    ) -> Result<(), SnapshotError> {
        self.ensure_dir().await?;

        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| SnapshotError::SerializationFailed(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .await
            .map_err(|e| SnapshotError::IoError(e.to_string()))?;
        fs::rename(&tmp, path)
            .await
            .map_err(|e| SnapshotError::IoError(e.to_string()))?;

        Ok(())
    }

    async fn read_json<T: DeserializeOwned + Default>(&self, path: &Path) -> Result<T, SnapshotError> {
        if !fs::try_exists(path)
            .await
            .map_err(|e| SnapshotError::IoError(e.to_string()))?
        {
            return Ok(T::default());
        }

        let bytes = fs::read(path)
            .await
            .map_err(|e| SnapshotError::IoError(e.to_string()))?;

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            Err(e) => {
                // Keep the unreadable file for inspection; the next save must not clobber it.
                let quarantine = path.with_extension("json.corrupt");
                if let Err(rename_err) = fs::rename(path, &quarantine).await {
                    tracing::error!(
                        path = %path.display(),
                        error = %rename_err,
                        "Failed to quarantine unreadable snapshot"
                    );
                } else {
                    tracing::error!(
                        path = %path.display(),
                        quarantine = %quarantine.display(),
                        "Unreadable snapshot moved aside"
                    );
                }
                Err(SnapshotError::DeserializationFailed(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl SnapshotStorage for FileSnapshotStorage {
    async fn load_pending(&self) -> Result<Vec<WebhookEvent>, SnapshotError> {
        self.read_json(&self.pending_path()).await
    }

    async fn save_pending(&self, events: &[WebhookEvent]) -> Result<(), SnapshotError> {
        self.write_json(&self.pending_path(), events).await
    }

    async fn load_processed(&self) -> Result<Vec<String>, SnapshotError> {
        self.read_json(&self.processed_path()).await
    }

    async fn save_processed(&self, ids: &[String]) -> Result<(), SnapshotError> {
        self.write_json(&self.processed_path(), ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use tempfile::TempDir;

    fn test_event(subscription: &str) -> WebhookEvent {
        let body = format!(
            r#"{{"event":"PAYMENT_CONFIRMED","payment":{{"subscription":"{}","customer":"cus_1"}}}}"#,
            subscription
        );
        WebhookEvent::from_raw("asaas", body.as_bytes(), Timestamp::now())
            .unwrap()
            .0
    }

    #[tokio::test]
    async fn test_missing_files_load_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSnapshotStorage::new(temp_dir.path().join("not-yet-created"));

        assert!(storage.load_pending().await.unwrap().is_empty());
        assert!(storage.load_processed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load_pending() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSnapshotStorage::new(temp_dir.path());

        let events = vec![test_event("sub_1"), test_event("sub_2")];
        storage.save_pending(&events).await.unwrap();

        let loaded = storage.load_pending().await.unwrap();
        assert_eq!(loaded, events);
    }

    #[tokio::test]
    async fn test_save_and_load_processed_keeps_order() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSnapshotStorage::new(temp_dir.path());

        let ids = vec!["asaas:a".to_string(), "asaas:b".to_string(), "asaas:c".to_string()];
        storage.save_processed(&ids).await.unwrap();

        assert_eq!(storage.load_processed().await.unwrap(), ids);
    }

    #[tokio::test]
    async fn test_save_replaces_previous_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSnapshotStorage::new(temp_dir.path());

        storage.save_pending(&[test_event("sub_1")]).await.unwrap();
        storage.save_pending(&[]).await.unwrap();

        assert!(storage.load_pending().await.unwrap().is_empty());
        assert!(!temp_dir.path().join("pending-events.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_quarantined() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSnapshotStorage::new(temp_dir.path());
        std::fs::write(storage.pending_path(), b"{ not json").unwrap();

        let result = storage.load_pending().await;

        assert!(matches!(result, Err(SnapshotError::DeserializationFailed(_))));
        assert!(!storage.pending_path().exists());
        assert!(temp_dir.path().join("pending-events.json.corrupt").exists());
    }

    #[tokio::test]
    async fn test_files_use_documented_names() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileSnapshotStorage::new(temp_dir.path());

        storage.save_pending(&[]).await.unwrap();
        storage.save_processed(&[]).await.unwrap();

        assert!(temp_dir.path().join("pending-events.json").exists());
        assert!(temp_dir.path().join("processed-ids.json").exists());
    }
}
