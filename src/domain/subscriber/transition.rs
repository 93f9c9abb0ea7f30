//! Transition planning for lifecycle events.
//!
//! `plan_transition` is the whole state machine of the reconciler as a pure
//! function: current record + verified event + the gateway's subscription
//! snapshot in, updated record + side effects out. No I/O happens here.
//!
//! # Ordering rules
//!
//! | Rule | Effect |
//! |------|--------|
//! | Renewal never shortens | `period_end = max(stored, authoritative)` |
//! | Stale events never move status | `occurred_at < last_event_at` → no-op |
//! | Deletion of a superseded subscription | no-op |
//! | Checkout for a subscription the gateway no longer bills | no-op |
//! | Checkout for a new subscription while active | adopt the new subscription id |

use super::lifecycle_event::{LifecycleEvent, LifecycleEventKind};
use super::record::SubscriberRecord;
use super::side_effect::SideEffect;
use super::status::SubscriptionStatus;
use crate::domain::foundation::{DomainError, Timestamp};

/// The gateway's current view of the subscription a checkout created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    pub period_end: Timestamp,

    /// False once the gateway has canceled or stopped billing the subscription.
    pub live: bool,
}

/// Outcome of planning one event against one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Save `record`, then run `effects`.
    Transition {
        record: SubscriberRecord,
        effects: Vec<SideEffect>,
    },

    /// Nothing to save; run `effects` only.
    NotifyOnly { effects: Vec<SideEffect> },

    /// Event acknowledged without any change.
    NoOp { reason: String },
}

impl Plan {
    fn no_op(reason: impl Into<String>) -> Self {
        Plan::NoOp {
            reason: reason.into(),
        }
    }
}

/// Plans the state change for `event` against `current`.
///
/// `subscription` must be read back from the gateway; it is required for
/// completed checkouts only.
///
/// # Errors
///
/// Returns a validation error when a completed checkout arrives without a
/// subscription snapshot.
pub fn plan_transition(
    current: &SubscriberRecord,
    event: &LifecycleEvent,
    subscription: Option<SubscriptionSnapshot>,
) -> Result<Plan, DomainError> {
    match &event.kind {
        LifecycleEventKind::CheckoutCompleted {
            subscription_id, ..
        } => {
            let snapshot = subscription.ok_or_else(|| {
                DomainError::validation(
                    "subscription",
                    "checkout completion requires the gateway's subscription",
                )
            })?;
            if !snapshot.live {
                return Ok(Plan::no_op("subscription is no longer live at the gateway"));
            }
            plan_checkout(current, event, subscription_id, snapshot.period_end)
        }

        LifecycleEventKind::SubscriptionDeleted {
            subscription_id, ..
        } => Ok(plan_deletion(current, event, subscription_id)),

        LifecycleEventKind::InvoicePaymentFailed {
            subscription_id, ..
        } => Ok(plan_payment_failure(
            current,
            event,
            subscription_id.as_deref(),
        )),

        LifecycleEventKind::Unhandled { event_type } => {
            Ok(Plan::no_op(format!("event type {} is not handled", event_type)))
        }
    }
}

fn plan_checkout(
    current: &SubscriberRecord,
    event: &LifecycleEvent,
    subscription_id: &str,
    period_end: Timestamp,
) -> Result<Plan, DomainError> {
    let mut record = current.clone();

    match current.status {
        SubscriptionStatus::Active => {
            let stored = current.period_end.unwrap_or(period_end);
            if !period_end.is_after(&stored) {
                let switched = current.subscription_id.as_deref() != Some(subscription_id);
                if switched && !current.is_stale(event.occurred_at) {
                    record.activate(stored, subscription_id, event.occurred_at)?;
                    return Ok(Plan::Transition {
                        record,
                        effects: Vec::new(),
                    });
                }
                return Ok(Plan::no_op("period end already current"));
            }
            record.activate(period_end, subscription_id, event.occurred_at)?;
            Ok(Plan::Transition {
                effects: vec![SideEffect::ConfirmRenewal {
                    external_user_id: record.external_user_id.clone(),
                    period_end,
                }],
                record,
            })
        }

        SubscriptionStatus::Cancelled if current.is_stale(event.occurred_at) => {
            Ok(Plan::no_op("checkout predates the cancellation already applied"))
        }

        SubscriptionStatus::Inactive | SubscriptionStatus::Cancelled => {
            record.activate(period_end, subscription_id, event.occurred_at)?;
            Ok(Plan::Transition {
                effects: vec![SideEffect::GrantAccess {
                    external_user_id: record.external_user_id.clone(),
                    period_end,
                }],
                record,
            })
        }
    }
}

fn plan_deletion(current: &SubscriberRecord, event: &LifecycleEvent, subscription_id: &str) -> Plan {
    if current.status != SubscriptionStatus::Active {
        return Plan::no_op(format!("subscriber is {}", current.status));
    }
    if is_superseded(current, Some(subscription_id)) {
        return Plan::no_op("deleted subscription is not the current one");
    }
    if current.is_stale(event.occurred_at) {
        return Plan::no_op("deletion predates the last applied event");
    }

    let mut record = current.clone();
    // Status was checked above, so the transition cannot fail.
    if let Err(err) = record.cancel(event.occurred_at) {
        return Plan::no_op(err.message);
    }
    let external_user_id = record.external_user_id.clone();
    Plan::Transition {
        record,
        effects: vec![
            SideEffect::RevokeAccess {
                external_user_id: external_user_id.clone(),
            },
            SideEffect::NotifyCancelled { external_user_id },
        ],
    }
}

fn plan_payment_failure(
    current: &SubscriberRecord,
    event: &LifecycleEvent,
    subscription_id: Option<&str>,
) -> Plan {
    if current.status != SubscriptionStatus::Active {
        return Plan::no_op(format!("subscriber is {}", current.status));
    }
    if is_superseded(current, subscription_id) {
        return Plan::no_op("failed invoice belongs to a previous subscription");
    }
    if current.is_stale(event.occurred_at) {
        return Plan::no_op("payment failure predates the last applied event");
    }
    Plan::NotifyOnly {
        effects: vec![SideEffect::WarnPaymentFailed {
            external_user_id: current.external_user_id.clone(),
        }],
    }
}

fn is_superseded(current: &SubscriberRecord, event_subscription: Option<&str>) -> bool {
    match (current.subscription_id.as_deref(), event_subscription) {
        (Some(known), Some(incoming)) => known != incoming,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{ExternalUserId, PaymentCustomerId};

    fn ts(secs: i64) -> Timestamp {
        Timestamp::from_unix_secs(secs).unwrap()
    }

    fn live(period_end: i64) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            period_end: ts(period_end),
            live: true,
        }
    }

    fn canceled_upstream(period_end: i64) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            period_end: ts(period_end),
            live: false,
        }
    }

    fn inactive() -> SubscriberRecord {
        SubscriberRecord::new(
            ExternalUserId::new("100").unwrap(),
            "Grace",
            None,
            PaymentCustomerId::new("cus_100").unwrap(),
        )
    }

    fn active(period_end: i64, last_event: i64) -> SubscriberRecord {
        let mut record = inactive();
        record.activate(ts(period_end), "sub_1", ts(last_event)).unwrap();
        record
    }

    fn cancelled(at: i64) -> SubscriberRecord {
        let mut record = active(10_000, at - 10);
        record.cancel(ts(at)).unwrap();
        record
    }

    fn checkout(at: i64, subscription_id: &str) -> LifecycleEvent {
        LifecycleEvent {
            event_id: format!("evt_checkout_{}", at),
            occurred_at: ts(at),
            kind: LifecycleEventKind::CheckoutCompleted {
                external_user_id: Some(ExternalUserId::new("100").unwrap()),
                customer_id: Some(PaymentCustomerId::new("cus_100").unwrap()),
                subscription_id: subscription_id.to_string(),
            },
        }
    }

    fn deleted(at: i64, subscription_id: &str) -> LifecycleEvent {
        LifecycleEvent {
            event_id: format!("evt_deleted_{}", at),
            occurred_at: ts(at),
            kind: LifecycleEventKind::SubscriptionDeleted {
                customer_id: PaymentCustomerId::new("cus_100").unwrap(),
                subscription_id: subscription_id.to_string(),
                external_user_id: None,
            },
        }
    }

    fn payment_failed(at: i64) -> LifecycleEvent {
        LifecycleEvent {
            event_id: format!("evt_failed_{}", at),
            occurred_at: ts(at),
            kind: LifecycleEventKind::InvoicePaymentFailed {
                customer_id: PaymentCustomerId::new("cus_100").unwrap(),
                subscription_id: Some("sub_1".to_string()),
            },
        }
    }

    fn expect_transition(plan: Plan) -> (SubscriberRecord, Vec<SideEffect>) {
        match plan {
            Plan::Transition { record, effects } => (record, effects),
            other => panic!("expected transition, got {:?}", other),
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Checkout Completed
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn checkout_activates_inactive_subscriber() {
        let plan = plan_transition(&inactive(), &checkout(1_000, "sub_1"), Some(live(5_000))).unwrap();
        let (record, effects) = expect_transition(plan);

        assert_eq!(record.status, SubscriptionStatus::Active);
        assert_eq!(record.period_end, Some(ts(5_000)));
        assert_eq!(record.subscription_id.as_deref(), Some("sub_1"));
        assert!(matches!(effects.as_slice(), [SideEffect::GrantAccess { .. }]));
    }

    #[test]
    fn checkout_without_subscription_snapshot_is_an_error() {
        let result = plan_transition(&inactive(), &checkout(1_000, "sub_1"), None);
        assert!(result.is_err());
    }

    #[test]
    fn renewal_extends_period_end() {
        let plan = plan_transition(&active(5_000, 1_000), &checkout(4_000, "sub_1"), Some(live(9_000)))
            .unwrap();
        let (record, effects) = expect_transition(plan);

        assert_eq!(record.period_end, Some(ts(9_000)));
        assert!(matches!(effects.as_slice(), [SideEffect::ConfirmRenewal { .. }]));
    }

    #[test]
    fn replayed_checkout_is_a_no_op() {
        let current = active(5_000, 1_000);
        let plan = plan_transition(&current, &checkout(1_000, "sub_1"), Some(live(5_000))).unwrap();
        assert!(matches!(plan, Plan::NoOp { .. }));
    }

    #[test]
    fn older_renewal_never_regresses_period_end() {
        let current = active(9_000, 4_000);
        let plan = plan_transition(&current, &checkout(1_000, "sub_1"), Some(live(5_000))).unwrap();
        assert!(matches!(plan, Plan::NoOp { .. }));
    }

    #[test]
    fn checkout_resubscribes_cancelled_subscriber() {
        let plan =
            plan_transition(&cancelled(2_000), &checkout(3_000, "sub_2"), Some(live(20_000))).unwrap();
        let (record, effects) = expect_transition(plan);

        assert_eq!(record.status, SubscriptionStatus::Active);
        assert_eq!(record.subscription_id.as_deref(), Some("sub_2"));
        assert!(matches!(effects.as_slice(), [SideEffect::GrantAccess { .. }]));
    }

    #[test]
    fn stale_checkout_does_not_reactivate_cancelled_subscriber() {
        let plan =
            plan_transition(&cancelled(2_000), &checkout(1_500, "sub_1"), Some(live(20_000))).unwrap();
        assert!(matches!(plan, Plan::NoOp { .. }));
    }

    #[test]
    fn checkout_for_canceled_subscription_does_not_activate() {
        let plan = plan_transition(
            &inactive(),
            &checkout(1_000, "sub_1"),
            Some(canceled_upstream(5_000)),
        )
        .unwrap();
        assert!(matches!(plan, Plan::NoOp { .. }));
    }

    #[test]
    fn checkout_for_canceled_subscription_does_not_renew() {
        let plan = plan_transition(
            &active(5_000, 1_000),
            &checkout(2_000, "sub_1"),
            Some(canceled_upstream(9_000)),
        )
        .unwrap();
        assert!(matches!(plan, Plan::NoOp { .. }));
    }

    #[test]
    fn new_subscription_is_adopted_without_extending_period() {
        let plan =
            plan_transition(&active(9_000, 1_000), &checkout(2_000, "sub_2"), Some(live(8_000)))
                .unwrap();
        let (record, effects) = expect_transition(plan);

        assert_eq!(record.subscription_id.as_deref(), Some("sub_2"));
        assert_eq!(record.period_end, Some(ts(9_000)));
        assert_eq!(record.last_event_at, Some(ts(2_000)));
        assert!(effects.is_empty());

        let deletion = plan_transition(&record, &deleted(3_000, "sub_1"), None).unwrap();
        assert!(matches!(deletion, Plan::NoOp { .. }));
    }

    #[test]
    fn stale_checkout_for_other_subscription_is_not_adopted() {
        let plan =
            plan_transition(&active(9_000, 3_000), &checkout(2_000, "sub_0"), Some(live(8_000)))
                .unwrap();
        assert!(matches!(plan, Plan::NoOp { .. }));
    }

    // ══════════════════════════════════════════════════════════════
    // Subscription Deleted
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn deletion_cancels_active_subscriber() {
        let plan = plan_transition(&active(5_000, 1_000), &deleted(2_000, "sub_1"), None).unwrap();
        let (record, effects) = expect_transition(plan);

        assert_eq!(record.status, SubscriptionStatus::Cancelled);
        assert!(record.period_end.is_none());
        assert_eq!(effects.len(), 2);
        assert!(effects.iter().any(|e| matches!(e, SideEffect::RevokeAccess { .. })));
        assert!(effects.iter().any(|e| matches!(e, SideEffect::NotifyCancelled { .. })));
    }

    #[test]
    fn deletion_for_inactive_subscriber_is_a_no_op() {
        let plan = plan_transition(&inactive(), &deleted(2_000, "sub_1"), None).unwrap();
        assert!(matches!(plan, Plan::NoOp { .. }));
    }

    #[test]
    fn deletion_of_superseded_subscription_is_ignored() {
        let plan = plan_transition(&active(5_000, 1_000), &deleted(2_000, "sub_old"), None).unwrap();
        assert!(matches!(plan, Plan::NoOp { .. }));
    }

    #[test]
    fn stale_deletion_is_ignored() {
        let plan = plan_transition(&active(5_000, 3_000), &deleted(2_000, "sub_1"), None).unwrap();
        assert!(matches!(plan, Plan::NoOp { .. }));
    }

    // ══════════════════════════════════════════════════════════════
    // Invoice Payment Failed
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn payment_failure_warns_active_subscriber_without_state_change() {
        let plan = plan_transition(&active(5_000, 1_000), &payment_failed(2_000), None).unwrap();
        match plan {
            Plan::NotifyOnly { effects } => {
                assert!(matches!(effects.as_slice(), [SideEffect::WarnPaymentFailed { .. }]));
            }
            other => panic!("expected notify-only, got {:?}", other),
        }
    }

    #[test]
    fn payment_failure_for_inactive_subscriber_is_a_no_op() {
        let plan = plan_transition(&inactive(), &payment_failed(2_000), None).unwrap();
        assert!(matches!(plan, Plan::NoOp { .. }));
    }

    #[test]
    fn unhandled_event_is_a_no_op() {
        let event = LifecycleEvent {
            event_id: "evt_x".to_string(),
            occurred_at: ts(1),
            kind: LifecycleEventKind::Unhandled {
                event_type: "invoice.paid".to_string(),
            },
        };
        let plan = plan_transition(&active(5_000, 1_000), &event, None).unwrap();
        assert!(matches!(plan, Plan::NoOp { .. }));
    }
}
