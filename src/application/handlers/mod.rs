//! Query and operator command handlers.
//!
//! Read paths over the subscription collections and the buffer, plus the
//! manual retry of frozen events.

mod audit_subscriptions;
mod get_entitlement;
mod get_webhook_stats;
mod retry_failed_event;

pub use audit_subscriptions::{
    AuditReport, AuditSubscriptionsHandler, Inconsistency, InconsistencyKind,
};
pub use get_entitlement::{EntitlementView, GetEntitlementHandler, GetEntitlementQuery};
pub use get_webhook_stats::{FailedEventView, GetWebhookStatsHandler, WebhookStats};
pub use retry_failed_event::{RetryFailedEventCommand, RetryFailedEventHandler};

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::ports::StoreError;

fn store_error(err: StoreError) -> DomainError {
    let code = if err.is_connection() {
        ErrorCode::StoreUnavailable
    } else {
        ErrorCode::DatabaseError
    };
    DomainError::new(code, err.to_string())
}
