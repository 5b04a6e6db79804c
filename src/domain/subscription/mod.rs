//! Subscription domain.
//!
//! Status lifecycle, provider event mapping, the transition function, and
//! the two documents a subscription is stored as.

mod event_type;
mod records;
mod status;
mod transition;

pub use event_type::{EventTarget, EventType};
pub use records::{BillingSubscription, Entitlement, StatusChange, StatusHistory};
pub use status::SubscriptionStatus;
pub use transition::{next, next_at, Transition, TransitionRejected, UnchangedReason};
