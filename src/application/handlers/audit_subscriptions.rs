//! AuditSubscriptionsHandler - Cross-collection consistency audit.
//!
//! Compares every billing document with the entitlement document of its
//! customer. Divergence is expected while events sit in the buffer; once it
//! drains, a non-empty report means manual reconciliation is needed.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::store_error;
use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::subscription::SubscriptionStatus;
use crate::ports::SubscriptionRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    StatusMismatch,
    MissingEntitlement,
    MissingBilling,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inconsistency {
    pub kind: InconsistencyKind,
    pub subscription_id: String,
    pub customer_id: String,
    pub billing_status: Option<SubscriptionStatus>,
    pub entitlement_status: Option<SubscriptionStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub billing_count: usize,
    pub entitlement_count: usize,
    pub consistent: bool,
    pub inconsistencies: Vec<Inconsistency>,
    pub checked_at: Timestamp,
}

pub struct AuditSubscriptionsHandler {
    repository: Arc<dyn SubscriptionRepository>,
}

impl AuditSubscriptionsHandler {
    pub fn new(repository: Arc<dyn SubscriptionRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self) -> Result<AuditReport, DomainError> {
        let billing = self.repository.list_billing().await.map_err(store_error)?;
        let entitlements = self
            .repository
            .list_entitlements()
            .await
            .map_err(store_error)?;

        let by_customer: HashMap<&str, _> = entitlements
            .iter()
            .map(|e| (e.customer_id.as_str(), e))
            .collect();

        let mut inconsistencies = Vec::new();

        for doc in &billing {
            match by_customer.get(doc.customer_id.as_str()) {
                None => inconsistencies.push(Inconsistency {
                    kind: InconsistencyKind::MissingEntitlement,
                    subscription_id: doc.subscription_id.clone(),
                    customer_id: doc.customer_id.clone(),
                    billing_status: Some(doc.status),
                    entitlement_status: None,
                }),
                Some(ent) if ent.subscription_id == doc.subscription_id && ent.status != doc.status => {
                    inconsistencies.push(Inconsistency {
                        kind: InconsistencyKind::StatusMismatch,
                        subscription_id: doc.subscription_id.clone(),
                        customer_id: doc.customer_id.clone(),
                        billing_status: Some(doc.status),
                        entitlement_status: Some(ent.status),
                    })
                }
                // Customer moved to another subscription, or statuses agree.
                Some(_) => {}
            }
        }

        for ent in &entitlements {
            let has_billing = billing
                .iter()
                .any(|b| b.subscription_id == ent.subscription_id && b.customer_id == ent.customer_id);
            if !has_billing {
                inconsistencies.push(Inconsistency {
                    kind: InconsistencyKind::MissingBilling,
                    subscription_id: ent.subscription_id.clone(),
                    customer_id: ent.customer_id.clone(),
                    billing_status: None,
                    entitlement_status: Some(ent.status),
                });
            }
        }

        if !inconsistencies.is_empty() {
            tracing::warn!(
                count = inconsistencies.len(),
                "Subscription collections are inconsistent"
            );
        }

        Ok(AuditReport {
            billing_count: billing.len(),
            entitlement_count: entitlements.len(),
            consistent: inconsistencies.is_empty(),
            inconsistencies,
            checked_at: Timestamp::now(),
        })
    }
}
