//! Transition function for subscription events.
//!
//! Pure computation: given the stored status (if any) and an inbound event,
//! decide whether the status changes, stays as it is, or the event is
//! illegal for the current status.

use std::fmt;

use thiserror::Error;

use super::event_type::{EventTarget, EventType};
use super::status::SubscriptionStatus;
use crate::domain::foundation::{StateMachine, Timestamp};
use crate::domain::webhook::WebhookPayload;

/// Outcome of a legal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The subscription moves to `to`. `from` is `None` for unseen subscriptions.
    Changed {
        from: Option<SubscriptionStatus>,
        to: SubscriptionStatus,
        /// Set when the subscription ends.
        ends_at: Option<Timestamp>,
    },
    /// Nothing to write.
    Unchanged { reason: UnchangedReason },
}

impl Transition {
    /// Status after applying the transition, if it writes one.
    pub fn target(&self) -> Option<SubscriptionStatus> {
        match self {
            Transition::Changed { to, .. } => Some(*to),
            Transition::Unchanged { .. } => None,
        }
    }
}

/// Why an event leaves the subscription untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnchangedReason {
    NotSubscriptionRelated,
    UnmappedEvent(String),
    AlreadyKnown,
    AlreadyInStatus(SubscriptionStatus),
    ProviderStatusIgnored(Option<String>),
}

impl fmt::Display for UnchangedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnchangedReason::NotSubscriptionRelated => write!(f, "event is not subscription related"),
            UnchangedReason::UnmappedEvent(name) => write!(f, "event type {} has no status mapping", name),
            UnchangedReason::AlreadyKnown => write!(f, "subscription already exists"),
            UnchangedReason::AlreadyInStatus(status) => write!(f, "subscription already {}", status),
            UnchangedReason::ProviderStatusIgnored(Some(status)) => {
                write!(f, "provider status {} does not change local status", status)
            }
            UnchangedReason::ProviderStatusIgnored(None) => {
                write!(f, "update carries no provider status")
            }
        }
    }
}

/// An event that is illegal for the current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{event_type} cannot move subscription from {from} to {to}")]
pub struct TransitionRejected {
    pub from: SubscriptionStatus,
    pub to: SubscriptionStatus,
    pub event_type: String,
}

/// Computes the next status using the current time for end dates.
pub fn next(
    current: Option<SubscriptionStatus>,
    event_type: &EventType,
    payload: &WebhookPayload,
) -> Result<Transition, TransitionRejected> {
    next_at(current, event_type, payload, Timestamp::now())
}

/// Computes the next status with an explicit clock.
pub fn next_at(
    current: Option<SubscriptionStatus>,
    event_type: &EventType,
    payload: &WebhookPayload,
    now: Timestamp,
) -> Result<Transition, TransitionRejected> {
    let target = match event_type.target() {
        EventTarget::Ignored => {
            return Ok(Transition::Unchanged {
                reason: UnchangedReason::UnmappedEvent(event_type.to_string()),
            })
        }
        EventTarget::Initial => {
            return Ok(match current {
                None => Transition::Changed {
                    from: None,
                    to: SubscriptionStatus::Pending,
                    ends_at: None,
                },
                Some(_) => Transition::Unchanged {
                    reason: UnchangedReason::AlreadyKnown,
                },
            })
        }
        EventTarget::ProviderStatus => match provider_target(payload) {
            Some(status) => status,
            None => {
                return Ok(Transition::Unchanged {
                    reason: UnchangedReason::ProviderStatusIgnored(
                        payload.provider_status().map(str::to_string),
                    ),
                })
            }
        },
        EventTarget::Status(status) => status,
    };

    let ends_at = (target == SubscriptionStatus::Canceled).then_some(now);

    match current {
        None => Ok(Transition::Changed {
            from: None,
            to: target,
            ends_at,
        }),
        Some(from) if from == target => Ok(Transition::Unchanged {
            reason: UnchangedReason::AlreadyInStatus(from),
        }),
        Some(from) if from.can_transition_to(&target) => Ok(Transition::Changed {
            from: Some(from),
            to: target,
            ends_at,
        }),
        Some(from) => Err(TransitionRejected {
            from,
            to: target,
            event_type: event_type.to_string(),
        }),
    }
}

fn provider_target(payload: &WebhookPayload) -> Option<SubscriptionStatus> {
    match payload.provider_status()?.parse::<SubscriptionStatus>().ok()? {
        status @ (SubscriptionStatus::Inactive | SubscriptionStatus::Expired) => Some(status),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::webhook::SubscriptionData;

    fn payload(event: &str) -> WebhookPayload {
        WebhookPayload {
            event: event.to_string(),
            ..Default::default()
        }
    }

    fn updated_with_status(status: &str) -> WebhookPayload {
        WebhookPayload {
            event: "SUBSCRIPTION_UPDATED".to_string(),
            subscription: Some(SubscriptionData {
                id: Some("sub_1".to_string()),
                status: Some(status.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn run(current: Option<SubscriptionStatus>, event: &str) -> Result<Transition, TransitionRejected> {
        next(current, &EventType::parse(event), &payload(event))
    }

    // ══════════════════════════════════════════════════════════════
    // Unseen subscriptions
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn confirmed_payment_creates_active_subscription() {
        let result = run(None, "PAYMENT_CONFIRMED").unwrap();
        assert_eq!(
            result,
            Transition::Changed {
                from: None,
                to: SubscriptionStatus::Active,
                ends_at: None
            }
        );
    }

    #[test]
    fn created_event_starts_pending() {
        assert_eq!(
            run(None, "SUBSCRIPTION_CREATED").unwrap().target(),
            Some(SubscriptionStatus::Pending)
        );
    }

    #[test]
    fn created_event_for_known_subscription_is_unchanged() {
        let result = run(Some(SubscriptionStatus::Active), "PAYMENT_CREATED").unwrap();
        assert_eq!(
            result,
            Transition::Unchanged {
                reason: UnchangedReason::AlreadyKnown
            }
        );
    }

    // ══════════════════════════════════════════════════════════════
    // Status changes
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn overdue_is_reachable_from_active() {
        assert_eq!(
            run(Some(SubscriptionStatus::Active), "PAYMENT_OVERDUE").unwrap().target(),
            Some(SubscriptionStatus::Overdue)
        );
    }

    #[test]
    fn payment_recovers_overdue_subscription() {
        assert_eq!(
            run(Some(SubscriptionStatus::Overdue), "PAYMENT_RECEIVED").unwrap().target(),
            Some(SubscriptionStatus::Active)
        );
    }

    #[test]
    fn cancel_sets_end_date() {
        let now = Timestamp::now();
        let event = EventType::parse("SUBSCRIPTION_CANCELLED");
        let result = next_at(
            Some(SubscriptionStatus::Active),
            &event,
            &payload("SUBSCRIPTION_CANCELLED"),
            now,
        )
        .unwrap();

        assert_eq!(
            result,
            Transition::Changed {
                from: Some(SubscriptionStatus::Active),
                to: SubscriptionStatus::Canceled,
                ends_at: Some(now)
            }
        );
    }

    #[test]
    fn chargeback_cancels() {
        assert_eq!(
            run(Some(SubscriptionStatus::Active), "PAYMENT_CHARGEBACK_REQUESTED")
                .unwrap()
                .target(),
            Some(SubscriptionStatus::Canceled)
        );
    }

    #[test]
    fn same_status_is_unchanged() {
        let result = run(Some(SubscriptionStatus::Active), "PAYMENT_CONFIRMED").unwrap();
        assert_eq!(
            result,
            Transition::Unchanged {
                reason: UnchangedReason::AlreadyInStatus(SubscriptionStatus::Active)
            }
        );
    }

    #[test]
    fn unmapped_event_is_unchanged_not_rejected() {
        let result = run(Some(SubscriptionStatus::Active), "PAYMENT_UPDATED").unwrap();
        assert!(matches!(
            result,
            Transition::Unchanged {
                reason: UnchangedReason::UnmappedEvent(_)
            }
        ));
    }

    // ══════════════════════════════════════════════════════════════
    // Provider-reported status
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn update_follows_inactive_provider_status() {
        let event = EventType::SubscriptionUpdated;
        let result = next(Some(SubscriptionStatus::Active), &event, &updated_with_status("INACTIVE")).unwrap();
        assert_eq!(result.target(), Some(SubscriptionStatus::Inactive));
    }

    #[test]
    fn update_follows_expired_provider_status() {
        let event = EventType::SubscriptionUpdated;
        let result = next(Some(SubscriptionStatus::Overdue), &event, &updated_with_status("expired")).unwrap();
        assert_eq!(result.target(), Some(SubscriptionStatus::Expired));
    }

    #[test]
    fn update_with_active_provider_status_is_unchanged() {
        let event = EventType::SubscriptionUpdated;
        let result = next(Some(SubscriptionStatus::Overdue), &event, &updated_with_status("ACTIVE")).unwrap();
        assert!(matches!(
            result,
            Transition::Unchanged {
                reason: UnchangedReason::ProviderStatusIgnored(Some(_))
            }
        ));
    }

    // ══════════════════════════════════════════════════════════════
    // Canceled is absorbing
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn late_confirmation_after_cancel_is_rejected() {
        let err = run(Some(SubscriptionStatus::Canceled), "PAYMENT_CONFIRMED").unwrap_err();
        assert_eq!(err.from, SubscriptionStatus::Canceled);
        assert_eq!(err.to, SubscriptionStatus::Active);
        assert_eq!(err.event_type, "PAYMENT_CONFIRMED");
    }

    #[test]
    fn repeated_cancel_is_unchanged() {
        let result = run(Some(SubscriptionStatus::Canceled), "PAYMENT_REFUNDED").unwrap();
        assert_eq!(
            result,
            Transition::Unchanged {
                reason: UnchangedReason::AlreadyInStatus(SubscriptionStatus::Canceled)
            }
        );
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        const EVENTS: [&str; 18] = [
            "SUBSCRIPTION_CREATED",
            "PAYMENT_CREATED",
            "PAYMENT_CONFIRMED",
            "PAYMENT_RECEIVED",
            "PAYMENT_RECEIVED_IN_CASH",
            "PAYMENT_OVERDUE",
            "PAYMENT_DELETED",
            "PAYMENT_REFUNDED",
            "PAYMENT_CHARGEBACK_REQUESTED",
            "PAYMENT_CHARGEBACK_DISPUTE",
            "SUBSCRIPTION_DELETED",
            "SUBSCRIPTION_CANCELLED",
            "SUBSCRIPTION_INACTIVATED",
            "SUBSCRIPTION_EXPIRED",
            "SUBSCRIPTION_UPDATED",
            "PAYMENT_UPDATED",
            "PAYMENT_ANTICIPATED",
            "SOMETHING_ELSE",
        ];

        fn arb_status() -> impl Strategy<Value = SubscriptionStatus> {
            prop::sample::select(SubscriptionStatus::ALL.to_vec())
        }

        fn arb_event() -> impl Strategy<Value = &'static str> {
            prop::sample::select(EVENTS.to_vec())
        }

        fn arb_provider_status() -> impl Strategy<Value = Option<String>> {
            prop::option::of(prop::sample::select(vec![
                "ACTIVE".to_string(),
                "INACTIVE".to_string(),
                "EXPIRED".to_string(),
                "overdue".to_string(),
            ]))
        }

        fn build(event: &str, provider_status: Option<String>) -> WebhookPayload {
            WebhookPayload {
                event: event.to_string(),
                subscription: Some(SubscriptionData {
                    id: Some("sub_p".to_string()),
                    status: provider_status,
                    ..Default::default()
                }),
                ..Default::default()
            }
        }

        proptest! {
            #[test]
            fn canceled_never_leaves_canceled(event in arb_event(), status in arb_provider_status()) {
                let payload = build(event, status);
                match next(Some(SubscriptionStatus::Canceled), &EventType::parse(event), &payload) {
                    Ok(Transition::Changed { to, .. }) => prop_assert_eq!(to, SubscriptionStatus::Canceled),
                    Ok(Transition::Unchanged { .. }) | Err(_) => {}
                }
            }

            #[test]
            fn applying_twice_reaches_the_same_status(
                current in prop::option::of(arb_status()),
                event in arb_event(),
                status in arb_provider_status(),
            ) {
                let payload = build(event, status);
                let event_type = EventType::parse(event);
                let first = next(current, &event_type, &payload);
                let second = next(current, &event_type, &payload);
                prop_assert_eq!(
                    first.as_ref().map(Transition::target).ok(),
                    second.as_ref().map(Transition::target).ok()
                );

                // Re-delivering the event after it was applied changes nothing.
                if let Ok(Transition::Changed { to, .. }) = first {
                    let replay = next(Some(to), &event_type, &payload);
                    prop_assert!(matches!(replay, Ok(Transition::Unchanged { .. })), "replay should be Unchanged");
                }
            }

            #[test]
            fn nothing_transitions_back_to_pending(current in arb_status(), event in arb_event()) {
                let payload = build(event, None);
                if let Ok(Transition::Changed { to, .. }) = next(Some(current), &EventType::parse(event), &payload) {
                    prop_assert_ne!(to, SubscriptionStatus::Pending);
                }
            }
        }
    }
}
