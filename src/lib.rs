//! Subscription Gate - Payment webhook ingestion for plan-gated data feeds.
//!
//! Receives subscription lifecycle webhooks from the payment provider,
//! verifies and de-duplicates them, and applies the resulting status to a
//! billing document and an entitlement document. Events that arrive while
//! the store is unreachable are held in a durable buffer and replayed once
//! the connection returns.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
