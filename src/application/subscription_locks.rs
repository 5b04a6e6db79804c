//! SubscriptionLocks - One async mutex per subscription id.
//!
//! The processor holds a subscription's lock from the billing read through
//! both writes, so two events for the same subscription never compute
//! their transition from the same snapshot. Events for different
//! subscriptions still run in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct SubscriptionLocks {
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SubscriptionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive use of `subscription_id`.
    ///
    /// Slots nobody holds or waits on are pruned on the way in.
    pub async fn acquire(&self, subscription_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots
                .entry(subscription_id.to_string())
                .or_default()
                .clone()
        };
        slot.lock_owned().await
    }

    /// Subscriptions currently held or awaited.
    pub async fn active(&self) -> usize {
        self.slots
            .lock()
            .await
            .values()
            .filter(|slot| Arc::strong_count(slot) > 1)
            .count()
    }
}
