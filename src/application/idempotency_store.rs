//! IdempotencyStore - Fingerprints of events that were fully applied.
//!
//! In-memory set with FIFO eviction once `capacity` is exceeded, hydrated
//! from and persisted to the processed-id snapshot. Losing an entry costs
//! at most a redundant re-apply, which the status histories absorb.
//!
//! The store also tracks which fingerprints currently sit in the durable
//! buffer; the buffer keeps that set in step with its own contents.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::ports::{SnapshotError, SnapshotStorage};

#[derive(Debug, Default)]
struct State {
    processed: HashSet<String>,
    order: VecDeque<String>,
    buffered: HashSet<String>,
    dirty: bool,
}

pub struct IdempotencyStore {
    state: Mutex<State>,
    storage: Arc<dyn SnapshotStorage>,
    capacity: usize,
}

impl IdempotencyStore {
    pub fn new(storage: Arc<dyn SnapshotStorage>, capacity: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            storage,
            capacity: capacity.max(1),
        }
    }

    /// Loads the processed-id snapshot, keeping the newest `capacity` ids.
    ///
    /// Returns the number of ids loaded.
    pub async fn hydrate(&self) -> Result<usize, SnapshotError> {
        let ids = self.storage.load_processed().await?;
        let skip = ids.len().saturating_sub(self.capacity);

        let mut state = self.state.lock().await;
        state.processed.clear();
        state.order.clear();
        for id in ids.into_iter().skip(skip) {
            if state.processed.insert(id.clone()) {
                state.order.push_back(id);
            }
        }
        state.dirty = false;

        tracing::info!(
            loaded = state.order.len(),
            trimmed = skip,
            "Idempotency store hydrated"
        );
        Ok(state.order.len())
    }

    pub async fn has_processed(&self, id: &str) -> bool {
        self.state.lock().await.processed.contains(id)
    }

    /// Records `id` as applied and drops it from the buffered set.
    pub async fn mark_processed(&self, id: &str) {
        let mut state = self.state.lock().await;
        state.buffered.remove(id);
        if !state.processed.insert(id.to_string()) {
            return;
        }
        state.order.push_back(id.to_string());
        state.dirty = true;

        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.processed.remove(&oldest);
                tracing::debug!(event_id = %oldest, "Evicted oldest processed id");
            }
        }
    }

    pub async fn is_buffered(&self, id: &str) -> bool {
        self.state.lock().await.buffered.contains(id)
    }

    pub(crate) async fn mark_buffered(&self, id: &str) {
        self.state.lock().await.buffered.insert(id.to_string());
    }

    pub(crate) async fn clear_buffered(&self, id: &str) {
        self.state.lock().await.buffered.remove(id);
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Writes the snapshot if anything changed since the last write.
    ///
    /// Returns true when a snapshot was written.
    pub async fn persist_if_dirty(&self) -> Result<bool, SnapshotError> {
        let ids: Vec<String> = {
            let mut state = self.state.lock().await;
            if !state.dirty {
                return Ok(false);
            }
            state.dirty = false;
            state.order.iter().cloned().collect()
        };

        if let Err(e) = self.storage.save_processed(&ids).await {
            self.state.lock().await.dirty = true;
            return Err(e);
        }

        tracing::debug!(count = ids.len(), "Idempotency snapshot written");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::InMemorySnapshotStorage;

    fn store(capacity: usize) -> (IdempotencyStore, InMemorySnapshotStorage) {
        let storage = InMemorySnapshotStorage::new();
        (IdempotencyStore::new(Arc::new(storage.clone()), capacity), storage)
    }

    #[tokio::test]
    async fn marks_and_reports_processed() {
        let (store, _) = store(10);
        assert!(!store.has_processed("asaas:a").await);

        store.mark_processed("asaas:a").await;

        assert!(store.has_processed("asaas:a").await);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn evicts_oldest_beyond_capacity() {
        let (store, _) = store(2);
        store.mark_processed("a").await;
        store.mark_processed("b").await;
        store.mark_processed("c").await;

        assert!(!store.has_processed("a").await);
        assert!(store.has_processed("b").await);
        assert!(store.has_processed("c").await);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn marking_twice_does_not_refresh_position() {
        let (store, _) = store(2);
        store.mark_processed("a").await;
        store.mark_processed("b").await;
        store.mark_processed("a").await;
        store.mark_processed("c").await;

        assert!(!store.has_processed("a").await);
    }

    #[tokio::test]
    async fn persists_only_when_dirty() {
        let (store, storage) = store(10);
        assert!(!store.persist_if_dirty().await.unwrap());

        store.mark_processed("a").await;
        store.mark_processed("b").await;
        assert!(store.persist_if_dirty().await.unwrap());
        assert!(!store.persist_if_dirty().await.unwrap());

        assert_eq!(storage.processed_snapshot().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn failed_persist_stays_dirty() {
        let (store, storage) = store(10);
        store.mark_processed("a").await;
        storage.set_fail_saves(true);

        assert!(store.persist_if_dirty().await.is_err());

        storage.set_fail_saves(false);
        assert!(store.persist_if_dirty().await.unwrap());
    }

    #[tokio::test]
    async fn hydrate_keeps_newest_entries() {
        let storage = InMemorySnapshotStorage::new();
        let ids: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        storage.save_processed(&ids).await.unwrap();

        let store = IdempotencyStore::new(Arc::new(storage), 2);
        assert_eq!(store.hydrate().await.unwrap(), 2);

        assert!(!store.has_processed("a").await);
        assert!(store.has_processed("c").await);
    }

    #[tokio::test]
    async fn processing_clears_buffered_flag() {
        let (store, _) = store(10);
        store.mark_buffered("a").await;
        assert!(store.is_buffered("a").await);

        store.mark_processed("a").await;
        assert!(!store.is_buffered("a").await);
    }
}
