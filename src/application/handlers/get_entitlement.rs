//! GetEntitlementHandler - Answers "is this customer entitled right now".

use std::sync::Arc;

use serde::Serialize;

use super::store_error;
use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::subscription::SubscriptionStatus;
use crate::ports::SubscriptionRepository;

#[derive(Debug, Clone)]
pub struct GetEntitlementQuery {
    pub customer_id: String,
}

/// Entitlement as seen by the streaming gate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementView {
    pub customer_id: String,
    pub entitled: bool,
    /// `None` when the customer has never had a subscription.
    pub status: Option<SubscriptionStatus>,
    pub plan: Option<String>,
    pub subscription_id: Option<String>,
    pub end_date: Option<Timestamp>,
}

pub struct GetEntitlementHandler {
    repository: Arc<dyn SubscriptionRepository>,
}

impl GetEntitlementHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, query: GetEntitlementQuery) -> Result<EntitlementView, DomainError> {
        if query.customer_id.trim().is_empty() {
            return Err(DomainError::validation("customer_id", "Customer id must not be blank"));
        }

        let record = self
            .repository
            .find_entitlement(&query.customer_id)
            .await
            .map_err(store_error)?;

        Ok(match record {
            Some(doc) => EntitlementView {
                entitled: doc.is_entitled(),
                status: Some(doc.status),
                plan: doc.plan,
                subscription_id: Some(doc.subscription_id),
                end_date: doc.end_date,
                customer_id: doc.customer_id,
            },
            None => EntitlementView {
                customer_id: query.customer_id,
                entitled: false,
                status: None,
                plan: None,
                subscription_id: None,
                end_date: None,
            },
        })
    }
}
