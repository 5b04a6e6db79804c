//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (timestamps, state machine trait, errors)
//! - `subscription` - Subscription lifecycle, event mapping and stored documents
//! - `webhook` - Signature verification, payload parsing and event fingerprints

pub mod foundation;
pub mod subscription;
pub mod webhook;
