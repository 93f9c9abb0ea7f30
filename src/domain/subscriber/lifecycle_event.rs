//! Verified payment lifecycle events.
//!
//! A `LifecycleEvent` only exists after the gateway adapter has verified the
//! webhook signature. Everything the reconciler needs is lifted out of the
//! gateway payload here, so the state machine never touches raw JSON.

use crate::domain::foundation::{ExternalUserId, PaymentCustomerId, Timestamp};

/// Gateway event type for a completed checkout.
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
/// Gateway event type for a deleted subscription.
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
/// Gateway event type for a failed invoice payment.
pub const INVOICE_PAYMENT_FAILED: &str = "invoice.payment_failed";

/// A gateway-issued fact about a payment or subscription change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// Gateway event id (evt_...), used for delivery deduplication.
    pub event_id: String,

    /// When the gateway issued the event.
    pub occurred_at: Timestamp,

    pub kind: LifecycleEventKind,
}

/// What happened, with the identifiers needed to resolve the subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEventKind {
    /// The user paid through a checkout session we created.
    CheckoutCompleted {
        /// From the session metadata set by `begin_checkout`.
        external_user_id: Option<ExternalUserId>,
        customer_id: Option<PaymentCustomerId>,
        subscription_id: String,
    },

    /// The subscription was deleted upstream (cancelled or ended unpaid).
    SubscriptionDeleted {
        customer_id: PaymentCustomerId,
        subscription_id: String,
        /// From the subscription metadata, when present.
        external_user_id: Option<ExternalUserId>,
    },

    /// A renewal charge failed; the gateway keeps retrying.
    InvoicePaymentFailed {
        customer_id: PaymentCustomerId,
        subscription_id: Option<String>,
    },

    /// Verified but irrelevant to entitlement.
    Unhandled { event_type: String },
}

impl LifecycleEvent {
    /// Gateway event type string.
    pub fn event_type(&self) -> &str {
        match &self.kind {
            LifecycleEventKind::CheckoutCompleted { .. } => CHECKOUT_COMPLETED,
            LifecycleEventKind::SubscriptionDeleted { .. } => SUBSCRIPTION_DELETED,
            LifecycleEventKind::InvoicePaymentFailed { .. } => INVOICE_PAYMENT_FAILED,
            LifecycleEventKind::Unhandled { event_type } => event_type,
        }
    }

    /// Customer id carried by the event, if any.
    pub fn customer_id(&self) -> Option<&PaymentCustomerId> {
        match &self.kind {
            LifecycleEventKind::CheckoutCompleted { customer_id, .. } => customer_id.as_ref(),
            LifecycleEventKind::SubscriptionDeleted { customer_id, .. }
            | LifecycleEventKind::InvoicePaymentFailed { customer_id, .. } => Some(customer_id),
            LifecycleEventKind::Unhandled { .. } => None,
        }
    }

    /// External user id carried directly by the event metadata, if any.
    pub fn external_user_id(&self) -> Option<&ExternalUserId> {
        match &self.kind {
            LifecycleEventKind::CheckoutCompleted {
                external_user_id, ..
            }
            | LifecycleEventKind::SubscriptionDeleted {
                external_user_id, ..
            } => external_user_id.as_ref(),
            _ => None,
        }
    }

    /// Returns true if the event can affect entitlement.
    pub fn is_handled(&self) -> bool {
        !matches!(self.kind, LifecycleEventKind::Unhandled { .. })
    }
}
