//! The two denormalized subscription documents.
//!
//! `BillingSubscription` is keyed by `(subscription_id, customer_id)` and
//! carries billing details. `Entitlement` is keyed by `customer_id` and is
//! what the streaming gate reads. Both keep their own append-only history.

use serde::{Deserialize, Serialize};

use super::status::SubscriptionStatus;
use crate::domain::foundation::Timestamp;

/// One entry in a status history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: SubscriptionStatus,
    pub timestamp: Timestamp,
    pub source: String,
    /// Fingerprint of the webhook event that caused the change.
    pub triggering_event: String,
}

/// Append-only status log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusHistory(Vec<StatusChange>);

impl StatusHistory {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns true if an entry was already written for this event.
    pub fn contains_event(&self, fingerprint: &str) -> bool {
        self.0.iter().any(|c| c.triggering_event == fingerprint)
    }

    /// Status the record had just before `fingerprint` was applied.
    ///
    /// `None` if the event is not in the history, `Some(None)` if it was
    /// the first entry.
    pub fn status_before(&self, fingerprint: &str) -> Option<Option<SubscriptionStatus>> {
        let index = self.0.iter().position(|c| c.triggering_event == fingerprint)?;
        Some(index.checked_sub(1).map(|prev| self.0[prev].status))
    }

    pub fn push(&mut self, change: StatusChange) {
        self.0.push(change);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> &[StatusChange] {
        &self.0
    }
}

/// Billing-oriented subscription document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillingSubscription {
    pub subscription_id: String,
    pub customer_id: String,
    pub user_id: Option<String>,
    pub status: SubscriptionStatus,
    pub status_history: StatusHistory,
    /// Charge value in cents.
    pub value: Option<i64>,
    pub next_due_date: Option<String>,
    pub cycle: Option<String>,
    pub end_date: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl BillingSubscription {
    pub fn new(
        subscription_id: impl Into<String>,
        customer_id: impl Into<String>,
        status: SubscriptionStatus,
        now: Timestamp,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            customer_id: customer_id.into(),
            user_id: None,
            status,
            status_history: StatusHistory::new(),
            value: None,
            next_due_date: None,
            cycle: None,
            end_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the status and appends the history entry.
    pub fn record(&mut self, change: StatusChange) {
        self.status = change.status;
        self.updated_at = change.timestamp;
        self.status_history.push(change);
    }
}

/// Entitlement-oriented document, one per customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entitlement {
    pub customer_id: String,
    pub user_id: Option<String>,
    pub subscription_id: String,
    pub status: SubscriptionStatus,
    pub plan: Option<String>,
    pub status_history: StatusHistory,
    pub end_date: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl Entitlement {
    pub fn new(
        customer_id: impl Into<String>,
        subscription_id: impl Into<String>,
        status: SubscriptionStatus,
        now: Timestamp,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            user_id: None,
            subscription_id: subscription_id.into(),
            status,
            plan: None,
            status_history: StatusHistory::new(),
            end_date: None,
            updated_at: now,
        }
    }

    pub fn record(&mut self, change: StatusChange) {
        self.status = change.status;
        self.updated_at = change.timestamp;
        self.status_history.push(change);
    }

    pub fn is_entitled(&self) -> bool {
        self.status.is_entitled()
    }
}
