//! Entitlement notification adapters.
//!
//! - `BroadcastNotifier` - In-process fan-out over a broadcast channel
//! - `RecordingNotifier` - Captures changes for tests

mod broadcast_notifier;

pub use broadcast_notifier::{BroadcastNotifier, RecordingNotifier};
