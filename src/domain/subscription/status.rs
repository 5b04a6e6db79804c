//! Subscription status state machine.
//!
//! Defines the lifecycle states a provider subscription can be in and
//! which status changes are legal from each of them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{StateMachine, ValidationError};

/// Subscription lifecycle status.
///
/// Stored lowercase. Parsing is case-insensitive so provider values such as
/// `ACTIVE` and stored values such as `active` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// First event seen for the subscription, nothing paid yet.
    Pending,

    /// Paid and current. The only status that grants access.
    Active,

    /// A charge is past its due date.
    Overdue,

    /// Cancelled, refunded or charged back. Absorbing.
    Canceled,

    /// Reached the end of its billing term.
    Expired,

    /// Deactivated by the provider.
    Inactive,
}

impl SubscriptionStatus {
    pub const ALL: [SubscriptionStatus; 6] = [
        SubscriptionStatus::Pending,
        SubscriptionStatus::Active,
        SubscriptionStatus::Overdue,
        SubscriptionStatus::Canceled,
        SubscriptionStatus::Expired,
        SubscriptionStatus::Inactive,
    ];

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Overdue => "overdue",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Inactive => "inactive",
        }
    }

    /// Returns true if a customer in this status may receive the gated feed.
    pub fn is_entitled(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            "overdue" => Ok(SubscriptionStatus::Overdue),
            "canceled" | "cancelled" => Ok(SubscriptionStatus::Canceled),
            "expired" => Ok(SubscriptionStatus::Expired),
            "inactive" => Ok(SubscriptionStatus::Inactive),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown subscription status '{}'", other),
            )),
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        match (self, target) {
            (Canceled, _) => false,
            // Pending only exists as the initial status
            (_, Pending) => false,
            _ => true,
        }
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Canceled => vec![],
            _ => vec![Active, Overdue, Inactive, Expired, Canceled],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("ACTIVE".parse::<SubscriptionStatus>(), Ok(SubscriptionStatus::Active));
        assert_eq!("active".parse::<SubscriptionStatus>(), Ok(SubscriptionStatus::Active));
        assert_eq!(" Overdue ".parse::<SubscriptionStatus>(), Ok(SubscriptionStatus::Overdue));
    }

    #[test]
    fn parse_accepts_both_cancel_spellings() {
        assert_eq!("CANCELLED".parse::<SubscriptionStatus>(), Ok(SubscriptionStatus::Canceled));
        assert_eq!("canceled".parse::<SubscriptionStatus>(), Ok(SubscriptionStatus::Canceled));
    }

    #[test]
    fn parse_rejects_unknown_status() {
        assert!("paused".parse::<SubscriptionStatus>().is_err());
    }

    #[test]
    fn display_matches_serde_name() {
        for status in SubscriptionStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status));
        }
    }

    #[test]
    fn only_active_is_entitled() {
        for status in SubscriptionStatus::ALL {
            assert_eq!(status.is_entitled(), status == SubscriptionStatus::Active);
        }
    }

    #[test]
    fn active_and_overdue_reach_each_other() {
        assert!(SubscriptionStatus::Active.can_transition_to(&SubscriptionStatus::Overdue));
        assert!(SubscriptionStatus::Overdue.can_transition_to(&SubscriptionStatus::Active));
    }

    #[test]
    fn canceled_is_terminal() {
        assert!(SubscriptionStatus::Canceled.is_terminal());
        for target in SubscriptionStatus::ALL {
            assert!(SubscriptionStatus::Canceled.transition_to(target).is_err());
        }
    }

    #[test]
    fn nothing_returns_to_pending() {
        for status in SubscriptionStatus::ALL {
            assert!(!status.can_transition_to(&SubscriptionStatus::Pending));
        }
    }

    #[test]
    fn valid_transitions_are_consistent_with_can_transition_to() {
        for status in SubscriptionStatus::ALL {
            for target in status.valid_transitions() {
                assert!(
                    status.can_transition_to(&target),
                    "can_transition_to should return true for {:?} -> {:?}",
                    status,
                    target
                );
            }
        }
    }
}
