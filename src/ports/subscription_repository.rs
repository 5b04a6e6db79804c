//! SubscriptionRepository port - The two subscription collections.
//!
//! Upserts replace the whole document for its key. Readers of the
//! entitlement collection never write.

use async_trait::async_trait;

use super::store_connector::StoreError;
use crate::domain::subscription::{BillingSubscription, Entitlement};

/// Port for reading and writing subscription documents.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Finds the billing document for a provider subscription id.
    async fn find_billing(
        &self,
        subscription_id: &str,
    ) -> Result<Option<BillingSubscription>, StoreError>;

    /// Inserts or replaces by `(subscription_id, customer_id)`.
    async fn upsert_billing(&self, record: &BillingSubscription) -> Result<(), StoreError>;

    /// Finds the entitlement document for a customer.
    async fn find_entitlement(&self, customer_id: &str) -> Result<Option<Entitlement>, StoreError>;

    /// Inserts or replaces by `customer_id`.
    async fn upsert_entitlement(&self, record: &Entitlement) -> Result<(), StoreError>;

    /// All billing documents, for the consistency audit.
    async fn list_billing(&self) -> Result<Vec<BillingSubscription>, StoreError>;

    /// All entitlement documents, for the consistency audit.
    async fn list_entitlements(&self) -> Result<Vec<Entitlement>, StoreError>;
}
