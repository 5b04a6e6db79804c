//! StoreConnector port - Lifecycle of the backing document store.
//!
//! The connection guardian drives this port: connect, register the required
//! collections, verify they are usable, and ping for health. A live
//! connection whose collections could not be verified is not ready.
//!
//! ## Readiness sequence
//!
//! ```text
//! connect --> register_collections --> verify_collections --> Ready
//!    ^                                                          |
//!    +------------------ ping fails / disconnect ---------------+
//! ```

use async_trait::async_trait;
use thiserror::Error;

/// A document collection the pipeline writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Billing-oriented subscriptions, keyed by `(subscription_id, customer_id)`.
    BillingSubscriptions,
    /// Entitlement-oriented records, keyed by `customer_id`.
    UserEntitlements,
}

impl Collection {
    /// Collections that must be usable before the store is ready.
    pub const REQUIRED: [Collection; 2] =
        [Collection::BillingSubscriptions, Collection::UserEntitlements];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::BillingSubscriptions => "billing_subscriptions",
            Collection::UserEntitlements => "user_entitlements",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised by store adapters.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Store connection failed: {0}")]
    Connection(String),

    #[error("Collection {collection} is not usable: {reason}")]
    CollectionUnavailable { collection: Collection, reason: String },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns true if the error means the connection itself is gone.
    pub fn is_connection(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }
}

/// Port for managing the store connection.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Opens (or re-opens) the connection.
    async fn connect(&self) -> Result<(), StoreError>;

    /// Cheap round trip to confirm the connection is alive.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Creates the collections if they do not exist.
    async fn register_collections(&self, collections: &[Collection]) -> Result<(), StoreError>;

    /// Confirms each collection exists and can be queried.
    async fn verify_collections(&self, collections: &[Collection]) -> Result<(), StoreError>;
}
