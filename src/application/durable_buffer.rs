//! DurableBuffer - Disk-backed queue of events not yet applied.
//!
//! Every mutation is followed by a full rewrite of the pending-events
//! snapshot while the buffer lock is held, so the file always mirrors
//! memory. The buffer is bounded by count and by age; both evictions are
//! lossy and logged as warnings.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde::Serialize;
use tokio::sync::Mutex;

use super::idempotency_store::IdempotencyStore;
use crate::config::BufferConfig;
use crate::domain::foundation::Timestamp;
use crate::domain::webhook::{EventStatus, WebhookEvent};
use crate::ports::{SnapshotError, SnapshotStorage};

/// Capacity, age and retry limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPolicy {
    pub capacity: usize,
    pub max_age: Duration,
    pub max_retries: u32,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            capacity: 1000,
            max_age: Duration::hours(48),
            max_retries: 5,
        }
    }
}

impl From<&BufferConfig> for BufferPolicy {
    fn from(config: &BufferConfig) -> Self {
        let max_age = Duration::try_hours(config.max_age_hours)
            .filter(|age| *age > Duration::zero())
            .unwrap_or_else(|| Self::default().max_age);
        Self {
            capacity: config.capacity.max(1),
            max_age,
            max_retries: config.max_retries.max(1),
        }
    }
}

/// Why an enqueue did or did not add the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnqueueReason {
    Added,
    AlreadyBuffered,
    AlreadyProcessed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOutcome {
    pub added: bool,
    pub reason: EnqueueReason,
}

impl EnqueueOutcome {
    fn added() -> Self {
        Self {
            added: true,
            reason: EnqueueReason::Added,
        }
    }

    fn skipped(reason: EnqueueReason) -> Self {
        Self {
            added: false,
            reason,
        }
    }
}

/// What the applier decided for one buffered event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainDecision {
    /// Resolved: applied, or dropped as non-retryable. Leaves the buffer.
    Done,
    /// Retryable failure; counts against the retry limit.
    Failed(String),
    /// The store went away mid-pass. Stops the pass without counting.
    Halt(String),
}

/// Applies buffered events during a drain pass.
#[async_trait]
pub trait BufferedEventApplier: Send + Sync {
    async fn apply_buffered(&self, event: &WebhookEvent) -> DrainDecision;
}

/// Counts from one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub processed: usize,
    pub retried: usize,
    /// Events frozen as failed during this pass.
    pub failed: usize,
    pub expired: usize,
    pub halted: bool,
    pub remaining: usize,
}

/// Point-in-time view for the stats path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferStats {
    pub pending: usize,
    pub failed: usize,
    pub failed_events: Vec<WebhookEvent>,
}

impl BufferStats {
    pub fn total(&self) -> usize {
        self.pending + self.failed
    }
}

pub struct DurableBuffer {
    events: Mutex<Vec<WebhookEvent>>,
    draining: Mutex<()>,
    storage: Arc<dyn SnapshotStorage>,
    idempotency: Arc<IdempotencyStore>,
    policy: BufferPolicy,
}

impl DurableBuffer {
    pub fn new(
        storage: Arc<dyn SnapshotStorage>,
        idempotency: Arc<IdempotencyStore>,
        policy: BufferPolicy,
    ) -> Self {
        let policy = BufferPolicy {
            capacity: policy.capacity.max(1),
            max_retries: policy.max_retries.max(1),
            ..policy
        };
        Self {
            events: Mutex::new(Vec::new()),
            draining: Mutex::new(()),
            storage,
            idempotency,
            policy,
        }
    }

    pub fn policy(&self) -> BufferPolicy {
        self.policy
    }

    /// Loads the pending-events snapshot.
    ///
    /// Hydrate the idempotency store first: events it already knows were
    /// applied before the crash and are dropped here.
    pub async fn hydrate(&self) -> Result<usize, SnapshotError> {
        let loaded = self.storage.load_pending().await?;
        let total = loaded.len();

        let mut kept: Vec<WebhookEvent> = Vec::with_capacity(total);
        for event in loaded {
            if event.status == EventStatus::Processed || kept.iter().any(|e| e.id == event.id) {
                continue;
            }
            if self.idempotency.has_processed(&event.id).await {
                tracing::info!(event_id = %event.id, "Dropping buffered event already applied");
                continue;
            }
            kept.push(event);
        }

        let mut events = self.events.lock().await;
        *events = kept;
        self.expire(&mut events).await;
        for event in events.iter() {
            self.idempotency.mark_buffered(&event.id).await;
        }
        if events.len() != total {
            self.save(&events).await;
        }

        tracing::info!(
            loaded = total,
            kept = events.len(),
            "Durable buffer hydrated"
        );
        Ok(events.len())
    }

    /// Adds an event unless it is already buffered or already applied.
    ///
    /// Makes room by age first, then by dropping the oldest entries.
    pub async fn enqueue(&self, mut event: WebhookEvent) -> EnqueueOutcome {
        if self.idempotency.has_processed(&event.id).await {
            return EnqueueOutcome::skipped(EnqueueReason::AlreadyProcessed);
        }

        let mut events = self.events.lock().await;
        if events.iter().any(|e| e.id == event.id) {
            return EnqueueOutcome::skipped(EnqueueReason::AlreadyBuffered);
        }

        self.expire(&mut events).await;
        while events.len() >= self.policy.capacity {
            let oldest = events.remove(0);
            self.idempotency.clear_buffered(&oldest.id).await;
            tracing::warn!(
                event_id = %oldest.id,
                event_type = %oldest.event_type(),
                capacity = self.policy.capacity,
                "Buffer full, evicting oldest event"
            );
        }

        event.status = EventStatus::Pending;
        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type(),
            retry_count = event.retry_count,
            "Event buffered"
        );
        self.idempotency.mark_buffered(&event.id).await;
        events.push(event);
        self.save(&events).await;

        EnqueueOutcome::added()
    }

    /// Runs one pass over a snapshot of the pending events.
    ///
    /// Events enqueued during the pass wait for the next one. Only one pass
    /// runs at a time; a concurrent call returns an empty report.
    pub async fn drain(&self, applier: &dyn BufferedEventApplier) -> DrainReport {
        let Ok(_pass) = self.draining.try_lock() else {
            tracing::debug!("Drain already in progress");
            return DrainReport::default();
        };

        let mut report = DrainReport::default();
        let snapshot: Vec<WebhookEvent> = {
            let mut events = self.events.lock().await;
            report.expired = self.expire(&mut events).await;
            if report.expired > 0 {
                self.save(&events).await;
            }
            events.iter().filter(|e| e.is_pending()).cloned().collect()
        };

        for event in snapshot {
            match applier.apply_buffered(&event).await {
                DrainDecision::Done => {
                    self.remove_applied(&event.id).await;
                    report.processed += 1;
                }
                DrainDecision::Failed(error) => {
                    if self.record_failure(&event.id, error).await {
                        report.failed += 1;
                    } else {
                        report.retried += 1;
                    }
                }
                DrainDecision::Halt(reason) => {
                    tracing::info!(
                        event_id = %event.id,
                        reason = %reason,
                        "Drain halted, store unavailable"
                    );
                    report.halted = true;
                    break;
                }
            }
        }

        report.remaining = self.events.lock().await.len();
        if report.processed + report.retried + report.failed > 0 || report.halted {
            tracing::info!(
                processed = report.processed,
                retried = report.retried,
                failed = report.failed,
                expired = report.expired,
                remaining = report.remaining,
                halted = report.halted,
                "Buffer drain pass complete"
            );
        }
        report
    }

    /// Re-arms a failed event for automatic retries.
    ///
    /// Returns false if no failed event has this id.
    pub async fn requeue_failed(&self, id: &str) -> bool {
        let mut events = self.events.lock().await;
        let Some(event) = events.iter_mut().find(|e| e.id == id && e.is_failed()) else {
            return false;
        };

        event.status = EventStatus::Pending;
        event.retry_count = 0;
        event.last_error = None;
        tracing::info!(event_id = %id, "Failed event re-armed for retry");

        self.save(&events).await;
        true
    }

    pub async fn stats(&self) -> BufferStats {
        let events = self.events.lock().await;
        let failed_events: Vec<WebhookEvent> =
            events.iter().filter(|e| e.is_failed()).cloned().collect();
        BufferStats {
            pending: events.iter().filter(|e| e.is_pending()).count(),
            failed: failed_events.len(),
            failed_events,
        }
    }

    pub async fn get(&self, id: &str) -> Option<WebhookEvent> {
        self.events.lock().await.iter().find(|e| e.id == id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.events.lock().await.iter().any(|e| e.id == id)
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn remove_applied(&self, id: &str) {
        self.idempotency.mark_processed(id).await;
        let mut events = self.events.lock().await;
        let now = Timestamp::now();
        for event in events.iter_mut().filter(|e| e.id == id) {
            event.status = EventStatus::Processed;
            tracing::debug!(
                event_id = %event.id,
                retry_count = event.retry_count,
                age_hours = event.age_hours(now),
                "Buffered event applied"
            );
        }
        let before = events.len();
        events.retain(|e| e.status != EventStatus::Processed);
        if events.len() != before {
            self.save(&events).await;
        }
    }

    /// Returns true if the failure froze the event.
    async fn record_failure(&self, id: &str, error: String) -> bool {
        let mut events = self.events.lock().await;
        let Some(event) = events.iter_mut().find(|e| e.id == id) else {
            return false;
        };

        event.retry_count += 1;
        event.last_error = Some(error);
        let frozen = event.retry_count >= self.policy.max_retries;

        if frozen {
            event.status = EventStatus::Failed;
            tracing::warn!(
                event_id = %event.id,
                event_type = %event.event_type(),
                attempts = event.retry_count,
                last_error = event.last_error.as_deref().unwrap_or_default(),
                "Retry limit reached, event frozen as failed"
            );
        } else {
            tracing::debug!(
                event_id = %event.id,
                attempt = event.retry_count,
                max_retries = self.policy.max_retries,
                "Buffered event failed, will retry"
            );
        }

        self.save(&events).await;
        frozen
    }

    /// Drops events older than the configured age. Returns how many.
    async fn expire(&self, events: &mut Vec<WebhookEvent>) -> usize {
        let now = Timestamp::now();
        let max_age = self.policy.max_age;
        let (expired, kept): (Vec<WebhookEvent>, Vec<WebhookEvent>) = events
            .drain(..)
            .partition(|event| now.duration_since(&event.received_at) > max_age);
        *events = kept;

        for event in &expired {
            tracing::warn!(
                event_id = %event.id,
                event_type = %event.event_type(),
                received_at = %event.received_at,
                age_hours = event.age_hours(now),
                retry_count = event.retry_count,
                "Evicting buffered event past max age"
            );
            self.idempotency.clear_buffered(&event.id).await;
        }
        expired.len()
    }

    async fn save(&self, events: &[WebhookEvent]) {
        if let Err(e) = self.storage.save_pending(events).await {
            tracing::error!(
                error = %e,
                count = events.len(),
                "Failed to persist webhook buffer"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::InMemorySnapshotStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event(n: usize) -> WebhookEvent {
        event_at(n, Timestamp::now())
    }

    fn event_at(n: usize, received_at: Timestamp) -> WebhookEvent {
        let body = format!(
            r#"{{"event":"PAYMENT_CONFIRMED","id":"evt_{}","payment":{{"subscription":"sub_{}","customer":"cus_1"}}}}"#,
            n, n
        );
        WebhookEvent::from_raw("asaas", body.as_bytes(), received_at)
            .unwrap()
            .0
    }

    struct Setup {
        buffer: DurableBuffer,
        idempotency: Arc<IdempotencyStore>,
        storage: InMemorySnapshotStorage,
    }

    fn setup(policy: BufferPolicy) -> Setup {
        let storage = InMemorySnapshotStorage::new();
        let idempotency = Arc::new(IdempotencyStore::new(Arc::new(storage.clone()), 100));
        let buffer = DurableBuffer::new(Arc::new(storage.clone()), idempotency.clone(), policy);
        Setup {
            buffer,
            idempotency,
            storage,
        }
    }

    struct Always(DrainDecision, AtomicUsize);

    impl Always {
        fn new(decision: DrainDecision) -> Self {
            Self(decision, AtomicUsize::new(0))
        }

        fn calls(&self) -> usize {
            self.1.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BufferedEventApplier for Always {
        async fn apply_buffered(&self, _event: &WebhookEvent) -> DrainDecision {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn enqueue_persists_and_marks_buffered() {
        let s = setup(BufferPolicy::default());
        let e = event(1);

        let outcome = s.buffer.enqueue(e.clone()).await;

        assert!(outcome.added);
        assert_eq!(s.storage.pending_snapshot().await.len(), 1);
        assert!(s.idempotency.is_buffered(&e.id).await);
        let stored = s.buffer.get(&e.id).await.unwrap();
        assert_eq!(stored.retry_count, 0);
        assert_eq!(stored.status, EventStatus::Pending);
    }

    #[tokio::test]
    async fn enqueue_rejects_duplicates() {
        let s = setup(BufferPolicy::default());
        let e = event(1);
        s.buffer.enqueue(e.clone()).await;

        let outcome = s.buffer.enqueue(e).await;

        assert!(!outcome.added);
        assert_eq!(outcome.reason, EnqueueReason::AlreadyBuffered);
        assert_eq!(s.buffer.len().await, 1);
    }

    #[tokio::test]
    async fn enqueue_rejects_already_processed() {
        let s = setup(BufferPolicy::default());
        let e = event(1);
        s.idempotency.mark_processed(&e.id).await;

        let outcome = s.buffer.enqueue(e).await;

        assert_eq!(outcome.reason, EnqueueReason::AlreadyProcessed);
        assert!(s.buffer.is_empty().await);
    }

    #[tokio::test]
    async fn capacity_evicts_oldest_first() {
        let s = setup(BufferPolicy {
            capacity: 2,
            ..Default::default()
        });
        let (a, b, c) = (event(1), event(2), event(3));
        s.buffer.enqueue(a.clone()).await;
        s.buffer.enqueue(b.clone()).await;
        s.buffer.enqueue(c.clone()).await;

        assert_eq!(s.buffer.len().await, 2);
        assert!(!s.buffer.contains(&a.id).await);
        assert!(!s.idempotency.is_buffered(&a.id).await);
        assert!(s.buffer.contains(&c.id).await);
    }

    #[tokio::test]
    async fn zero_capacity_still_holds_newest_event() {
        let s = setup(BufferPolicy {
            capacity: 0,
            max_retries: 0,
            ..Default::default()
        });
        let (a, b) = (event(1), event(2));

        assert!(s.buffer.enqueue(a.clone()).await.added);
        assert!(s.buffer.enqueue(b.clone()).await.added);

        assert_eq!(s.buffer.policy().capacity, 1);
        assert_eq!(s.buffer.len().await, 1);
        assert!(s.buffer.contains(&b.id).await);
    }

    #[test]
    fn policy_from_config_keeps_limits_usable() {
        let config = BufferConfig {
            capacity: 0,
            max_age_hours: i64::MAX,
            max_retries: 0,
            ..Default::default()
        };

        let policy = BufferPolicy::from(&config);

        assert_eq!(policy.capacity, 1);
        assert_eq!(policy.max_retries, 1);
        assert_eq!(policy.max_age, Duration::hours(48));
    }

    #[test]
    fn policy_from_config_rejects_negative_age() {
        let config = BufferConfig {
            max_age_hours: -3,
            ..Default::default()
        };

        assert_eq!(BufferPolicy::from(&config).max_age, Duration::hours(48));
    }

    #[tokio::test]
    async fn old_events_are_evicted() {
        let s = setup(BufferPolicy::default());
        let stale = event_at(1, Timestamp::now().minus_hours(49));
        s.buffer.enqueue(stale.clone()).await;

        let report = s.buffer.drain(&Always::new(DrainDecision::Done)).await;

        assert_eq!(report.expired, 1);
        assert_eq!(report.processed, 0);
        assert!(s.buffer.is_empty().await);
    }

    #[tokio::test]
    async fn drain_removes_applied_events() {
        let s = setup(BufferPolicy::default());
        let e = event(1);
        s.buffer.enqueue(e.clone()).await;

        let report = s.buffer.drain(&Always::new(DrainDecision::Done)).await;

        assert_eq!(report.processed, 1);
        assert_eq!(report.remaining, 0);
        assert!(s.idempotency.has_processed(&e.id).await);
        assert!(s.storage.pending_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn failures_freeze_after_max_retries() {
        let s = setup(BufferPolicy {
            max_retries: 3,
            ..Default::default()
        });
        let e = event(1);
        s.buffer.enqueue(e.clone()).await;
        let applier = Always::new(DrainDecision::Failed("boom".to_string()));

        for _ in 0..3 {
            s.buffer.drain(&applier).await;
        }
        let stored = s.buffer.get(&e.id).await.unwrap();
        assert_eq!(stored.status, EventStatus::Failed);
        assert_eq!(stored.retry_count, 3);
        assert_eq!(stored.last_error.as_deref(), Some("boom"));

        s.buffer.drain(&applier).await;
        assert_eq!(applier.calls(), 3);
    }

    #[tokio::test]
    async fn halt_stops_pass_without_counting() {
        let s = setup(BufferPolicy::default());
        s.buffer.enqueue(event(1)).await;
        s.buffer.enqueue(event(2)).await;
        let applier = Always::new(DrainDecision::Halt("down".to_string()));

        let report = s.buffer.drain(&applier).await;

        assert!(report.halted);
        assert_eq!(applier.calls(), 1);
        assert_eq!(report.remaining, 2);
        let stats = s.buffer.stats().await;
        assert_eq!(stats.pending, 2);
        assert!(stats.failed_events.is_empty());
    }

    #[tokio::test]
    async fn requeue_rearms_failed_event() {
        let s = setup(BufferPolicy {
            max_retries: 1,
            ..Default::default()
        });
        let e = event(1);
        s.buffer.enqueue(e.clone()).await;
        s.buffer
            .drain(&Always::new(DrainDecision::Failed("boom".to_string())))
            .await;
        assert_eq!(s.buffer.stats().await.failed, 1);

        assert!(s.buffer.requeue_failed(&e.id).await);
        assert!(!s.buffer.requeue_failed(&e.id).await);

        let stored = s.buffer.get(&e.id).await.unwrap();
        assert_eq!(stored.retry_count, 0);
        assert!(stored.is_pending());
    }

    #[tokio::test]
    async fn hydrate_restores_pending_and_skips_applied() {
        let s = setup(BufferPolicy::default());
        let (a, b) = (event(1), event(2));
        s.buffer.enqueue(a.clone()).await;
        s.buffer.enqueue(b.clone()).await;

        let idempotency = Arc::new(IdempotencyStore::new(Arc::new(s.storage.clone()), 100));
        idempotency.mark_processed(&a.id).await;
        let restarted = DurableBuffer::new(
            Arc::new(s.storage.clone()),
            idempotency.clone(),
            BufferPolicy::default(),
        );

        assert_eq!(restarted.hydrate().await.unwrap(), 1);
        assert!(restarted.contains(&b.id).await);
        assert!(idempotency.is_buffered(&b.id).await);
    }

    #[tokio::test]
    async fn hydrate_drops_events_saved_as_processed() {
        let s = setup(BufferPolicy::default());
        let (mut applied, pending) = (event(1), event(2));
        applied.status = EventStatus::Processed;
        s.storage
            .save_pending(&[applied.clone(), pending.clone()])
            .await
            .unwrap();

        let restarted = DurableBuffer::new(
            Arc::new(s.storage.clone()),
            s.idempotency.clone(),
            BufferPolicy::default(),
        );

        assert_eq!(restarted.hydrate().await.unwrap(), 1);
        assert!(!restarted.contains(&applied.id).await);
        assert!(restarted.contains(&pending.id).await);
    }

    #[tokio::test]
    async fn save_failures_keep_events_in_memory() {
        let s = setup(BufferPolicy::default());
        s.storage.set_fail_saves(true);

        assert!(s.buffer.enqueue(event(1)).await.added);
        assert_eq!(s.buffer.len().await, 1);
    }
}
