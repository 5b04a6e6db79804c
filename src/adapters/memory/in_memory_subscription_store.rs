//! In-Memory Subscription Store Adapter
//!
//! Implements both store ports in memory. Switches simulate an unreachable
//! store, unusable collections, per-collection write failures and slow
//! reads or writes.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::subscription::{BillingSubscription, Entitlement};
use crate::ports::{Collection, StoreConnector, StoreError, SubscriptionRepository};

/// In-memory store. Clones share the same data and switches.
#[derive(Debug, Clone)]
pub struct InMemorySubscriptionStore {
    billing: Arc<RwLock<BTreeMap<(String, String), BillingSubscription>>>,
    entitlements: Arc<RwLock<BTreeMap<String, Entitlement>>>,
    registered: Arc<RwLock<HashSet<Collection>>>,
    available: Arc<AtomicBool>,
    registration_broken: Arc<AtomicBool>,
    fail_billing_writes: Arc<AtomicBool>,
    fail_entitlement_writes: Arc<AtomicBool>,
    read_delay_ms: Arc<AtomicU64>,
    write_delay_ms: Arc<AtomicU64>,
    connects: Arc<AtomicUsize>,
}

impl InMemorySubscriptionStore {
    /// Create an empty, reachable store
    pub fn new() -> Self {
        Self {
            billing: Arc::new(RwLock::new(BTreeMap::new())),
            entitlements: Arc::new(RwLock::new(BTreeMap::new())),
            registered: Arc::new(RwLock::new(HashSet::new())),
            available: Arc::new(AtomicBool::new(true)),
            registration_broken: Arc::new(AtomicBool::new(false)),
            fail_billing_writes: Arc::new(AtomicBool::new(false)),
            fail_entitlement_writes: Arc::new(AtomicBool::new(false)),
            read_delay_ms: Arc::new(AtomicU64::new(0)),
            write_delay_ms: Arc::new(AtomicU64::new(0)),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Simulates the store going down or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Connections succeed but collections cannot be registered
    pub fn set_registration_broken(&self, broken: bool) {
        self.registration_broken.store(broken, Ordering::SeqCst);
    }

    pub fn fail_billing_writes(&self, fail: bool) {
        self.fail_billing_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_entitlement_writes(&self, fail: bool) {
        self.fail_entitlement_writes.store(fail, Ordering::SeqCst);
    }

    /// Delays every billing lookup
    pub fn set_read_delay(&self, delay: Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Delays every upsert in both collections
    pub fn set_write_delay(&self, delay: Duration) {
        self.write_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of successful `connect` calls
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Inserts a billing document directly, bypassing switches
    pub async fn seed_billing(&self, record: BillingSubscription) {
        let key = (record.subscription_id.clone(), record.customer_id.clone());
        self.billing.write().await.insert(key, record);
    }

    /// Inserts an entitlement document directly, bypassing switches
    pub async fn seed_entitlement(&self, record: Entitlement) {
        self.entitlements
            .write()
            .await
            .insert(record.customer_id.clone(), record);
    }

    async fn lag(delay_ms: &AtomicU64) {
        let ms = delay_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Connection("store unreachable".to_string()))
        }
    }
}

impl Default for InMemorySubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreConnector for InMemorySubscriptionStore {
    async fn connect(&self) -> Result<(), StoreError> {
        self.check_available()?;
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn register_collections(&self, collections: &[Collection]) -> Result<(), StoreError> {
        self.check_available()?;
        if self.registration_broken.load(Ordering::SeqCst) {
            if let Some(collection) = collections.first() {
                return Err(StoreError::CollectionUnavailable {
                    collection: *collection,
                    reason: "permission denied".to_string(),
                });
            }
        }
        self.registered.write().await.extend(collections.iter().copied());
        Ok(())
    }

    async fn verify_collections(&self, collections: &[Collection]) -> Result<(), StoreError> {
        self.check_available()?;
        let registered = self.registered.read().await;
        for collection in collections {
            if !registered.contains(collection) {
                return Err(StoreError::CollectionUnavailable {
                    collection: *collection,
                    reason: "not registered".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionStore {
    async fn find_billing(
        &self,
        subscription_id: &str,
    ) -> Result<Option<BillingSubscription>, StoreError> {
        Self::lag(&self.read_delay_ms).await;
        self.check_available()?;
        let billing = self.billing.read().await;
        Ok(billing
            .values()
            .filter(|b| b.subscription_id == subscription_id)
            .max_by_key(|b| b.updated_at)
            .cloned())
    }

    async fn upsert_billing(&self, record: &BillingSubscription) -> Result<(), StoreError> {
        Self::lag(&self.write_delay_ms).await;
        self.check_available()?;
        if self.fail_billing_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Query("simulated billing write failure".to_string()));
        }
        let key = (record.subscription_id.clone(), record.customer_id.clone());
        self.billing.write().await.insert(key, record.clone());
        Ok(())
    }

    async fn find_entitlement(&self, customer_id: &str) -> Result<Option<Entitlement>, StoreError> {
        self.check_available()?;
        Ok(self.entitlements.read().await.get(customer_id).cloned())
    }

    async fn upsert_entitlement(&self, record: &Entitlement) -> Result<(), StoreError> {
        Self::lag(&self.write_delay_ms).await;
        self.check_available()?;
        if self.fail_entitlement_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Query(
                "simulated entitlement write failure".to_string(),
            ));
        }
        self.entitlements
            .write()
            .await
            .insert(record.customer_id.clone(), record.clone());
        Ok(())
    }

    async fn list_billing(&self) -> Result<Vec<BillingSubscription>, StoreError> {
        self.check_available()?;
        Ok(self.billing.read().await.values().cloned().collect())
    }

    async fn list_entitlements(&self) -> Result<Vec<Entitlement>, StoreError> {
        self.check_available()?;
        Ok(self.entitlements.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::subscription::SubscriptionStatus;

    fn billing(sub: &str, cus: &str) -> BillingSubscription {
        BillingSubscription::new(sub, cus, SubscriptionStatus::Active, Timestamp::now())
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_key() {
        let store = InMemorySubscriptionStore::new();
        store.upsert_billing(&billing("sub_1", "cus_1")).await.unwrap();

        let mut updated = billing("sub_1", "cus_1");
        updated.status = SubscriptionStatus::Overdue;
        store.upsert_billing(&updated).await.unwrap();

        let all = store.list_billing().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, SubscriptionStatus::Overdue);
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_with_connection_error() {
        let store = InMemorySubscriptionStore::new();
        store.set_available(false);

        assert!(store.connect().await.unwrap_err().is_connection());
        assert!(store.find_billing("sub_1").await.unwrap_err().is_connection());
        assert_eq!(store.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_collections_must_be_registered_before_verification() {
        let store = InMemorySubscriptionStore::new();
        store.connect().await.unwrap();

        assert!(store.verify_collections(&Collection::REQUIRED).await.is_err());

        store.register_collections(&Collection::REQUIRED).await.unwrap();
        assert!(store.verify_collections(&Collection::REQUIRED).await.is_ok());
    }

    #[tokio::test]
    async fn test_broken_registration() {
        let store = InMemorySubscriptionStore::new();
        store.set_registration_broken(true);

        let err = store
            .register_collections(&Collection::REQUIRED)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::CollectionUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_write_failure_switches_are_per_collection() {
        let store = InMemorySubscriptionStore::new();
        store.fail_entitlement_writes(true);

        assert!(store.upsert_billing(&billing("sub_1", "cus_1")).await.is_ok());
        let entitlement =
            Entitlement::new("cus_1", "sub_1", SubscriptionStatus::Active, Timestamp::now());
        assert!(store.upsert_entitlement(&entitlement).await.is_err());
    }

    #[tokio::test]
    async fn test_write_delay_holds_upserts() {
        let store = InMemorySubscriptionStore::new();
        store.set_write_delay(Duration::from_secs(3600));

        let pending = tokio::time::timeout(
            Duration::from_millis(20),
            store.upsert_billing(&billing("sub_1", "cus_1")),
        )
        .await;

        assert!(pending.is_err());
        assert!(store.list_billing().await.unwrap().is_empty());
    }
}
