//! Adapters - Implementations of port interfaces.
//!
//! - `events` - Entitlement change notifiers
//! - `http` - Axum routes for webhooks and operators
//! - `memory` - In-memory subscription store
//! - `postgres` - PostgreSQL document store
//! - `provider` - Payment provider lookup clients
//! - `storage` - Snapshot storage for the buffer and idempotency set

pub mod events;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod provider;
pub mod storage;

pub use events::{BroadcastNotifier, RecordingNotifier};
pub use memory::InMemorySubscriptionStore;
pub use postgres::PostgresDocumentStore;
pub use storage::{FileSnapshotStorage, InMemorySnapshotStorage};
