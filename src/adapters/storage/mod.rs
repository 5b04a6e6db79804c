//! Storage Adapters
//!
//! Implementations of the SnapshotStorage port for the durable buffer and
//! the idempotency store.
//!
//! ## Available Adapters
//!
//! - **FileSnapshotStorage** - JSON files on disk, atomic replace
//! - **InMemorySnapshotStorage** - In memory (testing/development)
//!
//! ## Usage
//!
//! ```ignore
//! use adapters::storage::{FileSnapshotStorage, InMemorySnapshotStorage};
//!
//! // Production: file-based storage
//! let storage = FileSnapshotStorage::new("./data/webhook-buffer");
//!
//! // Testing: in-memory storage
//! let storage = InMemorySnapshotStorage::new();
//! ```

mod file_snapshot_storage;
mod in_memory_snapshot_storage;

pub use file_snapshot_storage::FileSnapshotStorage;
pub use in_memory_snapshot_storage::InMemorySnapshotStorage;
