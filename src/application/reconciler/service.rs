//! SubscriptionReconciler - the single writer of subscriber state.
//!
//! # Event processing
//!
//! 1. Resolve the subscriber (metadata user id, then store reverse lookup
//!    by customer id, then the gateway customer's metadata)
//! 2. Take the per-subscriber lock and re-read the record
//! 3. For checkouts, read the authoritative period end back from the gateway
//! 4. Plan the transition (pure)
//! 5. Save with version compare-and-set
//! 6. Spawn side effects
//!
//! Nothing is sent unless step 5 succeeded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::{DomainError, ErrorCode, ExternalUserId};
use crate::domain::subscriber::{
    plan_transition, LifecycleEvent, LifecycleEventKind, Plan, SubscriberRecord,
    SubscriptionSnapshot,
};
use crate::ports::{
    AccessNotifier, CheckoutLink, CreateCheckoutRequest, CreateCustomerRequest, PaymentError,
    PaymentGateway, UserRecordStore,
};

use super::effects::{EffectRunner, PendingEffects};
use super::error::ReconcileError;
use super::keyed_locks::KeyedLocks;

/// Upper bounds for external calls made by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerTimeouts {
    pub gateway: Duration,
    pub store: Duration,
    pub notifier: Duration,
}

impl Default for ReconcilerTimeouts {
    fn default() -> Self {
        Self {
            gateway: Duration::from_secs(10),
            store: Duration::from_secs(5),
            notifier: Duration::from_secs(10),
        }
    }
}

/// What `apply_event` did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The record changed, or notifications were scheduled for it.
    Applied { record: SubscriberRecord },

    /// The event was acknowledged without effect.
    Ignored { reason: String },
}

/// Result of applying one lifecycle event.
#[derive(Debug)]
pub struct ApplyReport {
    pub outcome: ApplyOutcome,

    /// Spawned side-effect tasks. Callers may drop this.
    pub effects: PendingEffects,
}

impl ApplyReport {
    fn ignored(reason: impl Into<String>) -> Self {
        Self {
            outcome: ApplyOutcome::Ignored {
                reason: reason.into(),
            },
            effects: PendingEffects::none(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, ApplyOutcome::Applied { .. })
    }
}

/// Reconciles subscriber state with the payment gateway.
pub struct SubscriptionReconciler {
    store: Arc<dyn UserRecordStore>,
    gateway: Arc<dyn PaymentGateway>,
    effects: EffectRunner,
    locks: KeyedLocks<ExternalUserId>,
    timeouts: ReconcilerTimeouts,
}

impl SubscriptionReconciler {
    pub fn new(
        store: Arc<dyn UserRecordStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn AccessNotifier>,
        timeouts: ReconcilerTimeouts,
    ) -> Self {
        Self {
            store,
            gateway,
            effects: EffectRunner::new(notifier, timeouts.notifier),
            locks: KeyedLocks::new(),
            timeouts,
        }
    }

    /// Return the subscriber's record, creating it (and its gateway
    /// customer) on first contact.
    ///
    /// # Errors
    ///
    /// - `GatewayUnavailable` if the customer cannot be created; nothing is stored
    /// - `Store` / `Timeout` on persistence failure
    pub async fn ensure_user(
        &self,
        external_user_id: &ExternalUserId,
        username: Option<String>,
        display_name: &str,
    ) -> Result<SubscriberRecord, ReconcileError> {
        if let Some(existing) = self.find(external_user_id).await? {
            return Ok(existing);
        }

        let _guard = self.locks.lock(external_user_id).await;
        if let Some(existing) = self.find(external_user_id).await? {
            return Ok(existing);
        }

        let customer_id = self
            .gateway_call(
                "create_customer",
                self.gateway.create_customer(CreateCustomerRequest {
                    external_user_id: external_user_id.clone(),
                    name: display_name.to_string(),
                    username: username.clone(),
                }),
            )
            .await?;

        let record = SubscriberRecord::new(
            external_user_id.clone(),
            display_name,
            username,
            customer_id,
        );

        match self.store_call("insert", self.store.insert(&record)).await {
            Ok(()) => {
                tracing::info!(
                    external_user_id = %external_user_id,
                    customer_id = %record.payment_customer_id,
                    "Subscriber created"
                );
                Ok(record)
            }
            Err(ReconcileError::Store(e)) if e.code == ErrorCode::SubscriberExists => {
                // Another process inserted first; its record wins.
                tracing::warn!(
                    external_user_id = %external_user_id,
                    orphan_customer_id = %record.payment_customer_id,
                    "Concurrent subscriber creation, using existing record"
                );
                self.find(external_user_id)
                    .await?
                    .ok_or_else(|| ReconcileError::NotFound(external_user_id.clone()))
            }
            Err(e) => Err(e),
        }
    }

    /// Create a checkout session, registering the subscriber first if needed.
    ///
    /// # Errors
    ///
    /// - `GatewayUnavailable` if the customer or the session cannot be created
    /// - `Store` / `Timeout` on persistence failure
    pub async fn begin_checkout(
        &self,
        external_user_id: &ExternalUserId,
        username: Option<String>,
        display_name: &str,
    ) -> Result<CheckoutLink, ReconcileError> {
        let record = self
            .ensure_user(external_user_id, username, display_name)
            .await?;

        let link = self
            .gateway_call(
                "create_checkout_session",
                self.gateway.create_checkout_session(CreateCheckoutRequest {
                    customer_id: record.payment_customer_id.clone(),
                    external_user_id: external_user_id.clone(),
                }),
            )
            .await?;

        tracing::info!(
            external_user_id = %external_user_id,
            session_id = %link.session_id,
            "Checkout session created"
        );
        Ok(link)
    }

    /// Read a subscriber's record without creating it.
    pub async fn current_status(
        &self,
        external_user_id: &ExternalUserId,
    ) -> Result<SubscriberRecord, ReconcileError> {
        self.find(external_user_id)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(external_user_id.clone()))
    }

    /// Apply a verified lifecycle event.
    ///
    /// # Errors
    ///
    /// - `UnresolvedSubscriber` if no local subscriber matches
    /// - `GatewayUnavailable` if the subscription cannot be read back
    /// - `Store` / `Timeout` if the record cannot be loaded or saved
    pub async fn apply_event(&self, event: &LifecycleEvent) -> Result<ApplyReport, ReconcileError> {
        if !event.is_handled() {
            tracing::debug!(
                event_id = %event.event_id,
                event_type = event.event_type(),
                "Ignoring unhandled event type"
            );
            return Ok(ApplyReport::ignored(format!(
                "event type {} is not handled",
                event.event_type()
            )));
        }

        let user = self.resolve_subscriber(event).await?;
        let _guard = self.locks.lock(&user).await;

        let current = self
            .find(&user)
            .await?
            .ok_or_else(|| ReconcileError::UnresolvedSubscriber {
                reference: user.to_string(),
            })?;

        let subscription = match &event.kind {
            LifecycleEventKind::CheckoutCompleted {
                subscription_id, ..
            } => Some(self.subscription_snapshot(subscription_id).await?),
            _ => None,
        };

        let plan = plan_transition(&current, event, subscription)?;

        match plan {
            Plan::Transition { record, effects } => {
                self.store_call("update", self.store.update(&record)).await?;

                let mut saved = record;
                saved.version += 1;

                tracing::info!(
                    external_user_id = %user,
                    event_id = %event.event_id,
                    event_type = event.event_type(),
                    from = %current.status,
                    to = %saved.status,
                    period_end = ?saved.period_end.map(|t| t.to_date_string()),
                    "Subscriber state updated"
                );

                Ok(ApplyReport {
                    outcome: ApplyOutcome::Applied { record: saved },
                    effects: self.effects.spawn_all(effects),
                })
            }

            Plan::NotifyOnly { effects } => {
                tracing::info!(
                    external_user_id = %user,
                    event_id = %event.event_id,
                    event_type = event.event_type(),
                    "Scheduling notification without state change"
                );
                Ok(ApplyReport {
                    outcome: ApplyOutcome::Applied { record: current },
                    effects: self.effects.spawn_all(effects),
                })
            }

            Plan::NoOp { reason } => {
                tracing::info!(
                    external_user_id = %user,
                    event_id = %event.event_id,
                    event_type = event.event_type(),
                    reason = %reason,
                    "Event left state unchanged"
                );
                Ok(ApplyReport::ignored(reason))
            }
        }
    }

    /// Release lock entries for subscribers with no work in flight.
    pub fn prune_idle_locks(&self) -> usize {
        self.locks.prune()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    async fn resolve_subscriber(
        &self,
        event: &LifecycleEvent,
    ) -> Result<ExternalUserId, ReconcileError> {
        if let Some(user) = event.external_user_id() {
            if self.find(user).await?.is_some() {
                return Ok(user.clone());
            }
        }

        let Some(customer_id) = event.customer_id() else {
            return Err(ReconcileError::UnresolvedSubscriber {
                reference: event
                    .external_user_id()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| event.event_id.clone()),
            });
        };

        let by_customer = self
            .store_call(
                "find_by_customer_id",
                self.store.find_by_customer_id(customer_id),
            )
            .await?;
        if let Some(record) = by_customer {
            return Ok(record.external_user_id);
        }

        let customer = self
            .gateway_call("retrieve_customer", self.gateway.retrieve_customer(customer_id))
            .await?;
        if let Some(user) = customer.and_then(|c| c.external_user_id()) {
            if self.find(&user).await?.is_some() {
                return Ok(user);
            }
        }

        Err(ReconcileError::UnresolvedSubscriber {
            reference: customer_id.to_string(),
        })
    }

    async fn subscription_snapshot(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionSnapshot, ReconcileError> {
        let subscription = self
            .gateway_call(
                "retrieve_subscription",
                self.gateway.retrieve_subscription(subscription_id),
            )
            .await?
            .ok_or_else(|| {
                ReconcileError::GatewayUnavailable(PaymentError::not_found("Subscription"))
            })?;
        Ok(SubscriptionSnapshot {
            period_end: subscription.current_period_end,
            live: subscription.grants_access(),
        })
    }

    async fn find(&self, id: &ExternalUserId) -> Result<Option<SubscriberRecord>, ReconcileError> {
        self.store_call("find", self.store.find(id)).await
    }

    async fn gateway_call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, PaymentError>>,
    ) -> Result<T, ReconcileError> {
        match tokio::time::timeout(self.timeouts.gateway, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::warn!(operation, error = %e, "Payment gateway call failed");
                Err(ReconcileError::GatewayUnavailable(e))
            }
            Err(_) => {
                tracing::warn!(operation, "Payment gateway call timed out");
                Err(ReconcileError::GatewayUnavailable(PaymentError::timeout(
                    operation,
                )))
            }
        }
    }

    async fn store_call<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, DomainError>>,
    ) -> Result<T, ReconcileError> {
        match tokio::time::timeout(self.timeouts.store, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                if e.code != ErrorCode::SubscriberExists {
                    tracing::error!(operation, error = %e, "Record store call failed");
                }
                Err(ReconcileError::Store(e))
            }
            Err(_) => {
                tracing::error!(operation, "Record store call timed out");
                Err(ReconcileError::Timeout { operation })
            }
        }
    }
}
