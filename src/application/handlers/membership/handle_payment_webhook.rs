//! HandlePaymentWebhookHandler - Command handler for processing payment gateway webhooks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::application::reconciler::{ApplyOutcome, ReconcileError, SubscriptionReconciler};
use crate::domain::foundation::DomainError;
use crate::domain::webhook::WebhookError;
use crate::ports::{PaymentGateway, ProcessedWebhookRecord, ProcessedWebhookStore, SaveResult};

/// Command to handle a payment webhook.
#[derive(Debug, Clone)]
pub struct HandlePaymentWebhookCommand {
    /// Raw webhook payload, exactly as received.
    pub payload: Vec<u8>,
    /// `Stripe-Signature` header, if present.
    pub signature: Option<String>,
}

/// Result of webhook processing. Every variant is acknowledged to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlePaymentWebhookResult {
    /// The event changed state or scheduled notifications.
    Processed { event_id: String, event_type: String },
    /// The event was valid but had no effect.
    Ignored { event_id: String, reason: String },
    /// The event id was handled before.
    AlreadyProcessed { event_id: String },
    /// No local subscriber matches the event.
    Unresolved { event_id: String, reference: String },
}

/// Handler for processing payment gateway webhooks.
///
/// Verifies the signature, deduplicates by event id, and hands the event to
/// the reconciler. Side effects are left running in the background.
pub struct HandlePaymentWebhookHandler {
    reconciler: Arc<SubscriptionReconciler>,
    gateway: Arc<dyn PaymentGateway>,
    processed: Arc<dyn ProcessedWebhookStore>,
    store_timeout: Duration,
}

impl HandlePaymentWebhookHandler {
    pub fn new(
        reconciler: Arc<SubscriptionReconciler>,
        gateway: Arc<dyn PaymentGateway>,
        processed: Arc<dyn ProcessedWebhookStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            reconciler,
            gateway,
            processed,
            store_timeout,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandlePaymentWebhookCommand,
    ) -> Result<HandlePaymentWebhookResult, WebhookError> {
        // 1. Verify webhook signature and parse event
        let signature = cmd.signature.ok_or_else(|| {
            tracing::warn!("Webhook without Stripe-Signature header");
            WebhookError::MissingSignature
        })?;
        let event = self
            .gateway
            .verify_webhook_signature(&cmd.payload, &signature)
            .await?;
        let event_type = event.event_type().to_string();

        // 2. Short-circuit duplicate deliveries
        let seen = self
            .bounded(self.processed.find_by_event_id(&event.event_id))
            .await?;
        if seen.is_some() {
            tracing::info!(event_id = %event.event_id, event_type = %event_type, "Duplicate webhook delivery");
            return Ok(HandlePaymentWebhookResult::AlreadyProcessed {
                event_id: event.event_id,
            });
        }

        // 3. Reconcile
        let (record, result) = match self.reconciler.apply_event(&event).await {
            Ok(report) => match report.outcome {
                ApplyOutcome::Applied { .. } => (
                    ProcessedWebhookRecord::applied(&event.event_id, &event_type),
                    HandlePaymentWebhookResult::Processed {
                        event_id: event.event_id.clone(),
                        event_type: event_type.clone(),
                    },
                ),
                ApplyOutcome::Ignored { reason } => (
                    ProcessedWebhookRecord::ignored(&event.event_id, &event_type, &reason),
                    HandlePaymentWebhookResult::Ignored {
                        event_id: event.event_id.clone(),
                        reason,
                    },
                ),
            },

            Err(ReconcileError::UnresolvedSubscriber { reference }) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    event_type = %event_type,
                    reference = %reference,
                    "Webhook names no known subscriber"
                );
                (
                    ProcessedWebhookRecord::ignored(
                        &event.event_id,
                        &event_type,
                        format!("unresolved subscriber {}", reference),
                    ),
                    HandlePaymentWebhookResult::Unresolved {
                        event_id: event.event_id.clone(),
                        reference,
                    },
                )
            }

            Err(e) if e.is_retryable() => {
                tracing::error!(
                    event_id = %event.event_id,
                    event_type = %event_type,
                    error = %e,
                    "Webhook processing failed, gateway will redeliver"
                );
                return Err(match e {
                    ReconcileError::Store(err) => WebhookError::Database(err.to_string()),
                    other => WebhookError::Unavailable(other.to_string()),
                });
            }

            Err(e) => {
                tracing::error!(
                    event_id = %event.event_id,
                    event_type = %event_type,
                    error = %e,
                    "Webhook could not be applied"
                );
                let reason = e.to_string();
                (
                    ProcessedWebhookRecord::ignored(&event.event_id, &event_type, &reason),
                    HandlePaymentWebhookResult::Ignored {
                        event_id: event.event_id.clone(),
                        reason,
                    },
                )
            }
        };

        // 4. Remember the event id. State is already durable, so a failure
        //    here only weakens deduplication.
        match self.bounded(self.processed.save(record)).await {
            Ok(SaveResult::Inserted) => {}
            Ok(SaveResult::AlreadyExists) => {
                tracing::info!(event_id = %event.event_id, "Concurrent duplicate webhook delivery");
            }
            Err(e) => {
                tracing::error!(event_id = %event.event_id, error = %e, "Failed to record processed webhook");
            }
        }

        Ok(result)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, DomainError>>,
    ) -> Result<T, WebhookError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(|e| WebhookError::Database(e.to_string())),
            Err(_) => Err(WebhookError::Database(
                "processed webhook store timed out".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryProcessedWebhookStore, InMemoryUserRecordStore};
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::adapters::telegram::RecordingAccessNotifier;
    use crate::application::reconciler::ReconcilerTimeouts;
    use crate::domain::foundation::{ExternalUserId, PaymentCustomerId, Timestamp};
    use crate::domain::subscriber::{LifecycleEvent, LifecycleEventKind};
    use crate::ports::{PaymentError, WebhookOutcome};

    // ════════════════════════════════════════════════════════════════════════════
    // Test Fixture
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        handler: HandlePaymentWebhookHandler,
        reconciler: Arc<SubscriptionReconciler>,
        gateway: MockPaymentGateway,
        processed: InMemoryProcessedWebhookStore,
        notifier: RecordingAccessNotifier,
    }

    fn fixture() -> Fixture {
        let gateway = MockPaymentGateway::new();
        let notifier = RecordingAccessNotifier::new();
        let processed = InMemoryProcessedWebhookStore::new();
        let reconciler = Arc::new(SubscriptionReconciler::new(
            Arc::new(InMemoryUserRecordStore::new()),
            Arc::new(gateway.clone()),
            Arc::new(notifier.clone()),
            ReconcilerTimeouts::default(),
        ));
        let handler = HandlePaymentWebhookHandler::new(
            Arc::clone(&reconciler),
            Arc::new(gateway.clone()),
            Arc::new(processed.clone()),
            Duration::from_secs(1),
        );
        Fixture {
            handler,
            reconciler,
            gateway,
            processed,
            notifier,
        }
    }

    fn command() -> HandlePaymentWebhookCommand {
        HandlePaymentWebhookCommand {
            payload: b"{}".to_vec(),
            signature: Some("t=1,v1=00".to_string()),
        }
    }

    fn checkout_event(event_id: &str, user: &ExternalUserId) -> LifecycleEvent {
        LifecycleEvent {
            event_id: event_id.to_string(),
            occurred_at: Timestamp::now(),
            kind: LifecycleEventKind::CheckoutCompleted {
                external_user_id: Some(user.clone()),
                customer_id: None,
                subscription_id: "sub_1".to_string(),
            },
        }
    }

    async fn subscriber(f: &Fixture) -> ExternalUserId {
        let user = ExternalUserId::from_numeric(77);
        let record = f.reconciler.ensure_user(&user, None, "Ada").await.unwrap();
        f.gateway.add_subscription(
            "sub_1",
            record.payment_customer_id.as_str(),
            Timestamp::now().plus_days(30),
        );
        user
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn missing_signature_is_rejected() {
        let f = fixture();
        let result = f
            .handler
            .handle(HandlePaymentWebhookCommand {
                payload: b"{}".to_vec(),
                signature: None,
            })
            .await;

        assert!(matches!(result, Err(WebhookError::MissingSignature)));
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected_without_side_effects() {
        let f = fixture();
        let user = subscriber(&f).await;
        let report = f
            .reconciler
            .apply_event(&checkout_event("evt_1", &user))
            .await
            .unwrap();
        report.effects.join().await;
        let before = f.reconciler.current_status(&user).await.unwrap();
        let calls_before = f.notifier.calls().len();

        let gateway = MockPaymentGateway::rejecting_webhooks();
        gateway.push_webhook_event(LifecycleEvent {
            event_id: "evt_forged".to_string(),
            occurred_at: Timestamp::now(),
            kind: LifecycleEventKind::SubscriptionDeleted {
                customer_id: before.payment_customer_id.clone(),
                external_user_id: None,
                subscription_id: "sub_1".to_string(),
            },
        });
        let handler = HandlePaymentWebhookHandler::new(
            Arc::clone(&f.reconciler),
            Arc::new(gateway),
            Arc::new(f.processed.clone()),
            Duration::from_secs(1),
        );

        let result = handler.handle(command()).await;

        assert!(matches!(result, Err(WebhookError::InvalidSignature)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let after = f.reconciler.current_status(&user).await.unwrap();
        assert!(after.is_entitled());
        assert_eq!(after.version, before.version);
        assert_eq!(after.period_end, before.period_end);
        assert_eq!(f.notifier.calls().len(), calls_before);
        assert!(f.processed.find_by_event_id("evt_forged").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn checkout_is_processed_and_recorded() {
        let f = fixture();
        let user = subscriber(&f).await;
        f.gateway.push_webhook_event(checkout_event("evt_1", &user));

        let result = f.handler.handle(command()).await.unwrap();

        assert_eq!(
            result,
            HandlePaymentWebhookResult::Processed {
                event_id: "evt_1".to_string(),
                event_type: "checkout.session.completed".to_string(),
            }
        );
        let record = f.processed.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert_eq!(record.outcome, WebhookOutcome::Applied);
    }

    #[tokio::test]
    async fn duplicate_delivery_is_short_circuited() {
        let f = fixture();
        let user = subscriber(&f).await;
        f.gateway.push_webhook_event(checkout_event("evt_1", &user));
        f.gateway.push_webhook_event(checkout_event("evt_1", &user));

        f.handler.handle(command()).await.unwrap();
        let second = f.handler.handle(command()).await.unwrap();

        assert_eq!(
            second,
            HandlePaymentWebhookResult::AlreadyProcessed {
                event_id: "evt_1".to_string()
            }
        );
        assert_eq!(f.gateway.call_count("retrieve_subscription"), 1);
    }

    #[tokio::test]
    async fn unresolved_subscriber_is_acknowledged_and_recorded() {
        let f = fixture();
        f.gateway.push_webhook_event(LifecycleEvent {
            event_id: "evt_ghost".to_string(),
            occurred_at: Timestamp::now(),
            kind: LifecycleEventKind::SubscriptionDeleted {
                customer_id: PaymentCustomerId::new("cus_ghost").unwrap(),
                subscription_id: "sub_ghost".to_string(),
                external_user_id: None,
            },
        });

        let result = f.handler.handle(command()).await.unwrap();

        assert!(matches!(result, HandlePaymentWebhookResult::Unresolved { .. }));
        let record = f
            .processed
            .find_by_event_id("evt_ghost")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.outcome, WebhookOutcome::Ignored);
        assert!(f.notifier.calls().is_empty());
    }

    #[tokio::test]
    async fn gateway_failure_is_retryable_and_not_recorded() {
        let f = fixture();
        let user = subscriber(&f).await;
        f.gateway.push_webhook_event(checkout_event("evt_1", &user));
        f.gateway
            .set_method_error("retrieve_subscription", PaymentError::network("reset"));

        let err = f.handler.handle(command()).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(f.processed.find_by_event_id("evt_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unhandled_event_type_is_ignored() {
        let f = fixture();
        f.gateway.push_webhook_event(LifecycleEvent {
            event_id: "evt_other".to_string(),
            occurred_at: Timestamp::now(),
            kind: LifecycleEventKind::Unhandled {
                event_type: "invoice.paid".to_string(),
            },
        });

        let result = f.handler.handle(command()).await.unwrap();

        assert!(matches!(result, HandlePaymentWebhookResult::Ignored { .. }));
    }
}
