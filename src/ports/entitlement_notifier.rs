//! EntitlementNotifier port - Tells the streaming gate a customer changed.
//!
//! Sent only after both subscription collections were written.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::subscription::SubscriptionStatus;

/// A customer's entitlement after a successful dual write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementChanged {
    pub customer_id: String,
    pub user_id: Option<String>,
    pub subscription_id: String,
    pub status: SubscriptionStatus,
    pub entitled: bool,
    pub plan: Option<String>,
    pub changed_at: Timestamp,
}

/// Port for publishing entitlement changes.
///
/// Delivery is best-effort. Failures are logged by the caller and never
/// undo the write.
#[async_trait]
pub trait EntitlementNotifier: Send + Sync {
    async fn notify(&self, change: EntitlementChanged) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn EntitlementNotifier) {}

    #[test]
    fn change_serializes_camel_case() {
        let change = EntitlementChanged {
            customer_id: "cus_1".to_string(),
            user_id: None,
            subscription_id: "sub_1".to_string(),
            status: SubscriptionStatus::Active,
            entitled: true,
            plan: Some("MONTHLY".to_string()),
            changed_at: Timestamp::now(),
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["customerId"], "cus_1");
        assert_eq!(json["status"], "active");
        assert_eq!(json["entitled"], true);
    }
}
