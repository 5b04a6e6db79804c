//! DualStoreWriter - Applies a status to both subscription collections.
//!
//! The billing and entitlement writes run concurrently and both are always
//! attempted. A partial failure is reported as a whole; the caller retries
//! the event and the collection that already holds the event's history
//! entry skips its write on the retry.

use std::fmt;
use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{BillingSubscription, Entitlement, StatusChange, SubscriptionStatus};
use crate::domain::webhook::WebhookError;
use crate::ports::{EntitlementChanged, EntitlementNotifier, StoreError, SubscriptionRepository};

/// Everything needed to write one accepted status change.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub subscription_id: String,
    pub customer_id: String,
    pub user_id: Option<String>,
    pub status: SubscriptionStatus,
    /// Set when the status ends the subscription.
    pub ends_at: Option<Timestamp>,
    /// Fingerprint of the triggering webhook event.
    pub event_id: String,
    pub source: String,
    pub value: Option<i64>,
    pub next_due_date: Option<String>,
    pub cycle: Option<String>,
    pub plan: Option<String>,
    pub applied_at: Timestamp,
}

impl StatusUpdate {
    fn change(&self) -> StatusChange {
        StatusChange {
            status: self.status,
            timestamp: self.applied_at,
            source: self.source.clone(),
            triggering_event: self.event_id.clone(),
        }
    }
}

/// Per-collection result of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionWrite {
    Written,
    /// The history already holds this event.
    AlreadyApplied,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DualWriteOutcome {
    pub billing: CollectionWrite,
    pub entitlement: CollectionWrite,
    pub notified: bool,
}

/// At least one collection write failed.
#[derive(Debug, Clone)]
pub struct DualWriteError {
    pub billing: Option<StoreError>,
    pub entitlement: Option<StoreError>,
}

impl DualWriteError {
    /// True if either side failed because the store is unreachable.
    pub fn is_connection(&self) -> bool {
        [&self.billing, &self.entitlement]
            .into_iter()
            .flatten()
            .any(StoreError::is_connection)
    }
}

impl fmt::Display for DualWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |e: &Option<StoreError>| match e {
            Some(err) => err.to_string(),
            None => "ok".to_string(),
        };
        write!(
            f,
            "dual write incomplete (billing: {}, entitlement: {})",
            side(&self.billing),
            side(&self.entitlement)
        )
    }
}

impl std::error::Error for DualWriteError {}

impl From<DualWriteError> for WebhookError {
    fn from(err: DualWriteError) -> Self {
        if err.is_connection() {
            WebhookError::StoreUnavailable(err.to_string())
        } else {
            WebhookError::WriteFailure(err.to_string())
        }
    }
}

pub struct DualStoreWriter {
    repository: Arc<dyn SubscriptionRepository>,
    notifier: Arc<dyn EntitlementNotifier>,
}

impl DualStoreWriter {
    pub fn new(
        repository: Arc<dyn SubscriptionRepository>,
        notifier: Arc<dyn EntitlementNotifier>,
    ) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    /// Writes `update` to both collections, then notifies.
    ///
    /// The notification is sent only when both sides succeeded and at least
    /// one of them actually changed.
    pub async fn apply(&self, update: &StatusUpdate) -> Result<DualWriteOutcome, DualWriteError> {
        let (billing, entitlement) =
            futures::join!(self.write_billing(update), self.write_entitlement(update));

        let (billing, entitlement) = match (billing, entitlement) {
            (Ok(billing), Ok(entitlement)) => (billing, entitlement),
            (billing, entitlement) => {
                let err = DualWriteError {
                    billing: billing.err(),
                    entitlement: entitlement.err(),
                };
                tracing::warn!(
                    event_id = %update.event_id,
                    subscription_id = %update.subscription_id,
                    customer_id = %update.customer_id,
                    billing_ok = err.billing.is_none(),
                    entitlement_ok = err.entitlement.is_none(),
                    "Collections inconsistent after partial dual write"
                );
                return Err(err);
            }
        };

        let (entitlement_write, entitlement_doc) = entitlement;
        let changed =
            billing == CollectionWrite::Written || entitlement_write == CollectionWrite::Written;
        let notified = changed && self.notify(update, &entitlement_doc).await;

        tracing::info!(
            event_id = %update.event_id,
            subscription_id = %update.subscription_id,
            customer_id = %update.customer_id,
            status = %update.status,
            "Subscription status written"
        );

        Ok(DualWriteOutcome {
            billing,
            entitlement: entitlement_write,
            notified,
        })
    }

    async fn write_billing(&self, update: &StatusUpdate) -> Result<CollectionWrite, StoreError> {
        let existing = self
            .repository
            .find_billing(&update.subscription_id)
            .await?
            .filter(|doc| doc.customer_id == update.customer_id);

        let mut doc = match existing {
            Some(doc) if doc.status_history.contains_event(&update.event_id) => {
                return Ok(CollectionWrite::AlreadyApplied);
            }
            Some(doc) => doc,
            None => BillingSubscription::new(
                &update.subscription_id,
                &update.customer_id,
                update.status,
                update.applied_at,
            ),
        };

        if update.user_id.is_some() {
            doc.user_id = update.user_id.clone();
        }
        if update.value.is_some() {
            doc.value = update.value;
        }
        if update.next_due_date.is_some() {
            doc.next_due_date = update.next_due_date.clone();
        }
        if update.cycle.is_some() {
            doc.cycle = update.cycle.clone();
        }
        if update.ends_at.is_some() {
            doc.end_date = update.ends_at;
        }
        doc.record(update.change());

        self.repository.upsert_billing(&doc).await?;
        Ok(CollectionWrite::Written)
    }

    async fn write_entitlement(
        &self,
        update: &StatusUpdate,
    ) -> Result<(CollectionWrite, Entitlement), StoreError> {
        let existing = self.repository.find_entitlement(&update.customer_id).await?;

        let mut doc = match existing {
            Some(doc) if doc.status_history.contains_event(&update.event_id) => {
                return Ok((CollectionWrite::AlreadyApplied, doc));
            }
            Some(doc) => doc,
            None => Entitlement::new(
                &update.customer_id,
                &update.subscription_id,
                update.status,
                update.applied_at,
            ),
        };

        doc.subscription_id = update.subscription_id.clone();
        if update.user_id.is_some() {
            doc.user_id = update.user_id.clone();
        }
        if update.plan.is_some() {
            doc.plan = update.plan.clone();
        }
        if update.ends_at.is_some() {
            doc.end_date = update.ends_at;
        }
        doc.record(update.change());

        self.repository.upsert_entitlement(&doc).await?;
        Ok((CollectionWrite::Written, doc))
    }

    async fn notify(&self, update: &StatusUpdate, doc: &Entitlement) -> bool {
        let change = EntitlementChanged {
            customer_id: doc.customer_id.clone(),
            user_id: doc.user_id.clone(),
            subscription_id: doc.subscription_id.clone(),
            status: doc.status,
            entitled: doc.is_entitled(),
            plan: doc.plan.clone(),
            changed_at: update.applied_at,
        };

        match self.notifier.notify(change).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    customer_id = %doc.customer_id,
                    error = %e,
                    "Entitlement notification failed"
                );
                false
            }
        }
    }
}
