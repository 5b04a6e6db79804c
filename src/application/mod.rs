//! Application layer - The stateful pipeline components and their handlers.
//!
//! Components, leaf-first:
//!
//! - `IdempotencyStore` - Fingerprints already applied
//! - `DurableBuffer` - Disk-backed queue of events awaiting the store
//! - `ConnectionGuardian` - Store connection lifecycle and readiness
//! - `DualStoreWriter` - Billing and entitlement writes
//! - `SubscriptionLocks` - Per-subscription serialization of applies
//! - `WebhookProcessor` - verify → dedupe → apply or buffer
//! - `BufferDrainer` - Background drain and snapshot timer
//!
//! `handlers` holds the read paths and operator commands.

mod buffer_drainer;
mod connection_guardian;
mod dual_store_writer;
mod durable_buffer;
mod idempotency_store;
mod subscription_locks;
mod webhook_processor;

pub mod handlers;

pub use buffer_drainer::{BufferDrainer, BufferDrainerConfig};
pub use connection_guardian::{
    ConnectionGuardian, ConnectionState, ExponentialBackoff, GuardianSettings,
};
pub use dual_store_writer::{
    CollectionWrite, DualStoreWriter, DualWriteError, DualWriteOutcome, StatusUpdate,
};
pub use durable_buffer::{
    BufferPolicy, BufferStats, BufferedEventApplier, DrainDecision, DrainReport, DurableBuffer,
    EnqueueOutcome, EnqueueReason,
};
pub use idempotency_store::IdempotencyStore;
pub use subscription_locks::SubscriptionLocks;
pub use webhook_processor::{
    ProcessorSettings, ReceiveWebhookCommand, WebhookOutcome, WebhookProcessor,
};
