//! Subscriber record entity.
//!
//! One record per chat-platform user. The record is the durable truth for
//! entitlement; group membership and notifications follow from it.

use serde::{Deserialize, Serialize};

use super::status::SubscriptionStatus;
use crate::domain::foundation::{
    DomainError, ErrorCode, ExternalUserId, PaymentCustomerId, StateMachine, Timestamp,
};

/// Persisted entitlement and identity row for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub external_user_id: ExternalUserId,
    pub display_name: String,
    pub username: Option<String>,

    /// Assigned when the record is created and never reassigned.
    pub payment_customer_id: PaymentCustomerId,

    pub status: SubscriptionStatus,

    /// Set iff `status` is active.
    pub period_end: Option<Timestamp>,

    /// Gateway subscription most recently activated for this user.
    pub subscription_id: Option<String>,

    /// Issuance time of the newest lifecycle event applied to this record.
    pub last_event_at: Option<Timestamp>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,

    /// Optimistic concurrency counter, owned by the store.
    pub version: i64,
}

impl SubscriberRecord {
    /// Creates a new inactive subscriber.
    pub fn new(
        external_user_id: ExternalUserId,
        display_name: impl Into<String>,
        username: Option<String>,
        payment_customer_id: PaymentCustomerId,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            external_user_id,
            display_name: display_name.into(),
            username,
            payment_customer_id,
            status: SubscriptionStatus::Inactive,
            period_end: None,
            subscription_id: None,
            last_event_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Returns true if the subscriber may access gated content.
    pub fn is_entitled(&self) -> bool {
        self.status.has_access()
    }

    /// Returns true if an event issued at `occurred_at` predates one already applied.
    pub fn is_stale(&self, occurred_at: Timestamp) -> bool {
        self.last_event_at
            .map(|last| occurred_at.is_before(&last))
            .unwrap_or(false)
    }

    /// Activate (or renew) the subscription through `period_end`.
    ///
    /// # Errors
    ///
    /// Returns error if the current status cannot become active.
    pub fn activate(
        &mut self,
        period_end: Timestamp,
        subscription_id: impl Into<String>,
        occurred_at: Timestamp,
    ) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Active)?;
        self.period_end = Some(period_end);
        self.subscription_id = Some(subscription_id.into());
        self.observe_event(occurred_at);
        Ok(())
    }

    /// Cancel the subscription and clear the period end.
    ///
    /// # Errors
    ///
    /// Returns error if the subscriber is not active.
    pub fn cancel(&mut self, occurred_at: Timestamp) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Cancelled)?;
        self.period_end = None;
        self.observe_event(occurred_at);
        Ok(())
    }

    fn observe_event(&mut self, occurred_at: Timestamp) {
        self.last_event_at = Some(match self.last_event_at {
            Some(last) if last.is_after(&occurred_at) => last,
            _ => occurred_at,
        });
        self.updated_at = Timestamp::now();
    }

    fn transition_to(&mut self, target: SubscriptionStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!(
                    "Cannot transition subscriber from {:?} to {:?}",
                    self.status, target
                ),
            )
        })?;
        Ok(())
    }
}
