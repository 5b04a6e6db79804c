//! Entitlement notifiers.
//!
//! `BroadcastNotifier` fans changes out over a tokio broadcast channel to
//! whatever in-process consumers subscribed (the streaming gate, SSE
//! endpoints). `RecordingNotifier` captures changes for test assertions.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::{EntitlementChanged, EntitlementNotifier};

const DEFAULT_CAPACITY: usize = 256;

/// Broadcast-channel notifier.
///
/// Having no subscribers is not an error; the change is simply dropped.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<EntitlementChanged>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Slow receivers lag once more than `capacity` changes are queued.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EntitlementChanged> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntitlementNotifier for BroadcastNotifier {
    async fn notify(&self, change: EntitlementChanged) -> Result<(), DomainError> {
        match self.sender.send(change) {
            Ok(receivers) => {
                tracing::debug!(receivers, "Entitlement change broadcast");
            }
            Err(broadcast::error::SendError(change)) => {
                tracing::debug!(
                    customer_id = %change.customer_id,
                    "No entitlement subscribers, change dropped"
                );
            }
        }
        Ok(())
    }
}

/// Notifier that records every change it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    changes: Arc<RwLock<Vec<EntitlementChanged>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `notify` fail after recording the change.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn changes(&self) -> Vec<EntitlementChanged> {
        self.changes.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.changes.read().await.len()
    }
}

#[async_trait]
impl EntitlementNotifier for RecordingNotifier {
    async fn notify(&self, change: EntitlementChanged) -> Result<(), DomainError> {
        self.changes.write().await.push(change);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomainError::new(
                ErrorCode::NotificationFailed,
                "simulated notification failure",
            ));
        }
        Ok(())
    }
}
