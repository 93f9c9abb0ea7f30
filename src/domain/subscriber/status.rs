//! Subscription status state machine.
//!
//! One product tier, three states. Payment failures do not move the state;
//! they only produce a warning while the gateway retries the charge.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entitlement state of a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Known to the bot, never paid.
    Inactive,

    /// Paid through `period_end`. Grants group and video access.
    Active,

    /// Subscription deleted upstream. No access until resubscribed.
    Cancelled,
}

impl SubscriptionStatus {
    /// Returns true if this status grants access to gated content.
    pub fn has_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Active)
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        SubscriptionStatus::Inactive
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(SubscriptionStatus::Inactive),
            "active" => Ok(SubscriptionStatus::Active),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
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
        matches!(
            (self, target),
            (Inactive, Active)
                | (Active, Active) // Renewal
                | (Active, Cancelled)
                | (Cancelled, Active) // Resubscribe
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Inactive => vec![Active],
            Active => vec![Active, Cancelled],
            Cancelled => vec![Active],
        }
    }
}
