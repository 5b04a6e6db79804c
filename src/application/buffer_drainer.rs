//! BufferDrainer - Background service that empties the durable buffer.
//!
//! Two timers share one task: the drain interval retries buffered events
//! whenever the store is ready, and the snapshot interval persists the
//! idempotency store. On shutdown a final snapshot is written.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use super::durable_buffer::DrainReport;
use super::idempotency_store::IdempotencyStore;
use super::webhook_processor::WebhookProcessor;
use crate::config::BufferConfig;

#[derive(Debug, Clone)]
pub struct BufferDrainerConfig {
    pub drain_interval: Duration,
    pub snapshot_interval: Duration,
}

impl Default for BufferDrainerConfig {
    fn default() -> Self {
        Self {
            drain_interval: Duration::from_secs(30),
            snapshot_interval: Duration::from_secs(60),
        }
    }
}

impl From<&BufferConfig> for BufferDrainerConfig {
    fn from(config: &BufferConfig) -> Self {
        Self {
            drain_interval: config.drain_interval(),
            snapshot_interval: config.snapshot_interval(),
        }
    }
}

pub struct BufferDrainer {
    processor: Arc<WebhookProcessor>,
    idempotency: Arc<IdempotencyStore>,
    config: BufferDrainerConfig,
}

impl BufferDrainer {
    pub fn new(
        processor: Arc<WebhookProcessor>,
        idempotency: Arc<IdempotencyStore>,
        config: BufferDrainerConfig,
    ) -> Self {
        Self {
            processor,
            idempotency,
            config,
        }
    }

    /// Runs until `shutdown` flips to true, then flushes the snapshot.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut drain = time::interval(self.config.drain_interval);
        let mut snapshot = time::interval(self.config.snapshot_interval);
        drain.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        snapshot.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.persist_snapshot().await;
                        tracing::info!("Buffer drainer stopped");
                        return;
                    }
                }
                _ = drain.tick() => {
                    self.poll_once().await;
                }
                _ = snapshot.tick() => {
                    self.persist_snapshot().await;
                }
            }
        }
    }

    /// One drain attempt. `None` when the store was not ready.
    pub async fn poll_once(&self) -> Option<DrainReport> {
        self.processor.drain_buffer().await
    }

    pub async fn persist_snapshot(&self) {
        if let Err(e) = self.idempotency.persist_if_dirty().await {
            tracing::error!(error = %e, "Failed to persist idempotency snapshot");
        }
    }
}
