//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Store Ports
//!
//! - `StoreConnector` - Connection lifecycle and collection registration
//! - `SubscriptionRepository` - Billing and entitlement documents
//!
//! ## Buffer Ports
//!
//! - `SnapshotStorage` - Pending-events and processed-id documents
//!
//! ## Outbound Ports
//!
//! - `PaymentProvider` - Best-effort subscription/payment lookups
//! - `EntitlementNotifier` - Entitlement change fan-out

mod entitlement_notifier;
mod payment_provider;
mod snapshot_storage;
mod store_connector;
mod subscription_repository;

pub use entitlement_notifier::{EntitlementChanged, EntitlementNotifier};
pub use payment_provider::{PaymentError, PaymentProvider};
pub use snapshot_storage::{SnapshotError, SnapshotStorage};
pub use store_connector::{Collection, StoreConnector, StoreError};
pub use subscription_repository::SubscriptionRepository;
