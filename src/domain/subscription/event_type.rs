//! Provider event types and the status each one targets.

use std::fmt;

use super::status::SubscriptionStatus;

/// Provider event type, canonicalised to upper snake case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    SubscriptionCreated,
    PaymentCreated,
    PaymentConfirmed,
    PaymentReceived,
    PaymentReceivedInCash,
    PaymentOverdue,
    PaymentDeleted,
    PaymentRefunded,
    PaymentChargebackRequested,
    PaymentChargebackDispute,
    SubscriptionDeleted,
    SubscriptionCanceled,
    SubscriptionInactivated,
    SubscriptionExpired,
    SubscriptionUpdated,
    Other(String),
}

/// What an event asks the state machine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    /// Creates the subscription as pending if it has not been seen.
    Initial,
    /// Moves the subscription to a fixed status.
    Status(SubscriptionStatus),
    /// Follows the status reported inside the provider subscription object.
    ProviderStatus,
    /// Not a status-bearing event.
    Ignored,
}

impl EventType {
    /// Parses a raw provider event name.
    pub fn parse(raw: &str) -> Self {
        let canonical = raw.trim().to_ascii_uppercase().replace(['-', '.', ' '], "_");
        match canonical.as_str() {
            "SUBSCRIPTION_CREATED" => EventType::SubscriptionCreated,
            "PAYMENT_CREATED" => EventType::PaymentCreated,
            "PAYMENT_CONFIRMED" => EventType::PaymentConfirmed,
            "PAYMENT_RECEIVED" => EventType::PaymentReceived,
            "PAYMENT_RECEIVED_IN_CASH" => EventType::PaymentReceivedInCash,
            "PAYMENT_OVERDUE" => EventType::PaymentOverdue,
            "PAYMENT_DELETED" => EventType::PaymentDeleted,
            "PAYMENT_REFUNDED" => EventType::PaymentRefunded,
            "PAYMENT_CHARGEBACK_REQUESTED" => EventType::PaymentChargebackRequested,
            "PAYMENT_CHARGEBACK_DISPUTE" => EventType::PaymentChargebackDispute,
            "SUBSCRIPTION_DELETED" => EventType::SubscriptionDeleted,
            "SUBSCRIPTION_CANCELLED" | "SUBSCRIPTION_CANCELED" => EventType::SubscriptionCanceled,
            "SUBSCRIPTION_INACTIVATED" => EventType::SubscriptionInactivated,
            "SUBSCRIPTION_EXPIRED" => EventType::SubscriptionExpired,
            "SUBSCRIPTION_UPDATED" => EventType::SubscriptionUpdated,
            _ => EventType::Other(canonical),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventType::SubscriptionCreated => "SUBSCRIPTION_CREATED",
            EventType::PaymentCreated => "PAYMENT_CREATED",
            EventType::PaymentConfirmed => "PAYMENT_CONFIRMED",
            EventType::PaymentReceived => "PAYMENT_RECEIVED",
            EventType::PaymentReceivedInCash => "PAYMENT_RECEIVED_IN_CASH",
            EventType::PaymentOverdue => "PAYMENT_OVERDUE",
            EventType::PaymentDeleted => "PAYMENT_DELETED",
            EventType::PaymentRefunded => "PAYMENT_REFUNDED",
            EventType::PaymentChargebackRequested => "PAYMENT_CHARGEBACK_REQUESTED",
            EventType::PaymentChargebackDispute => "PAYMENT_CHARGEBACK_DISPUTE",
            EventType::SubscriptionDeleted => "SUBSCRIPTION_DELETED",
            EventType::SubscriptionCanceled => "SUBSCRIPTION_CANCELED",
            EventType::SubscriptionInactivated => "SUBSCRIPTION_INACTIVATED",
            EventType::SubscriptionExpired => "SUBSCRIPTION_EXPIRED",
            EventType::SubscriptionUpdated => "SUBSCRIPTION_UPDATED",
            EventType::Other(name) => name,
        }
    }

    /// Maps the event to its state machine target.
    pub fn target(&self) -> EventTarget {
        use EventType::*;
        match self {
            SubscriptionCreated | PaymentCreated => EventTarget::Initial,
            PaymentConfirmed | PaymentReceived | PaymentReceivedInCash => {
                EventTarget::Status(SubscriptionStatus::Active)
            }
            PaymentOverdue => EventTarget::Status(SubscriptionStatus::Overdue),
            PaymentDeleted
            | PaymentRefunded
            | PaymentChargebackRequested
            | PaymentChargebackDispute
            | SubscriptionDeleted
            | SubscriptionCanceled => EventTarget::Status(SubscriptionStatus::Canceled),
            SubscriptionInactivated => EventTarget::Status(SubscriptionStatus::Inactive),
            SubscriptionExpired => EventTarget::Status(SubscriptionStatus::Expired),
            SubscriptionUpdated => EventTarget::ProviderStatus,
            Other(_) => EventTarget::Ignored,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
