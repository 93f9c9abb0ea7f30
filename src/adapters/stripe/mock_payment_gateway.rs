//! Mock payment gateway for testing.
//!
//! Provides a configurable implementation of `PaymentGateway` for unit and
//! integration tests. Supports:
//! - Pre-configured subscriptions and customers
//! - Error injection
//! - Call tracking
//! - Webhook event simulation
//! - Artificial latency (for timeout tests)

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::foundation::{PaymentCustomerId, Timestamp};
use crate::domain::subscriber::LifecycleEvent;
use crate::domain::webhook::WebhookError;
use crate::ports::{
    CheckoutLink, CreateCheckoutRequest, CreateCustomerRequest, GatewayCustomer,
    GatewaySubscription, PaymentError, PaymentGateway, PortalSession, USER_METADATA_KEY,
};

/// Mock payment gateway for testing.
///
/// # Example
///
/// ```ignore
/// let mock = MockPaymentGateway::new();
/// mock.add_subscription("sub_1", "cus_1", period_end);
/// mock.set_method_error("retrieve_subscription", PaymentError::network("down"));
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentGateway {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    customers: HashMap<String, GatewayCustomer>,
    subscriptions: HashMap<String, GatewaySubscription>,
    webhook_events: VecDeque<LifecycleEvent>,
    reject_webhooks: bool,
    next_error: Option<PaymentError>,
    method_errors: HashMap<String, PaymentError>,
    delay: Option<Duration>,
    customer_seq: u32,
    call_log: Vec<MethodCall>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentGateway {
    /// Create a new mock gateway with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that fails all webhook verifications.
    pub fn rejecting_webhooks() -> Self {
        let mock = Self::new();
        mock.state().reject_webhooks = true;
        mock
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Add a subscription to the "gateway".
    pub fn add_subscription(
        &self,
        subscription_id: &str,
        customer_id: &str,
        current_period_end: Timestamp,
    ) {
        let Ok(customer_id) = PaymentCustomerId::new(customer_id) else {
            return;
        };
        let subscription = GatewaySubscription {
            id: subscription_id.to_string(),
            customer_id,
            status: "active".to_string(),
            current_period_end,
        };
        self.state()
            .subscriptions
            .insert(subscription_id.to_string(), subscription);
    }

    /// Change the gateway status of a previously added subscription.
    pub fn set_subscription_status(&self, subscription_id: &str, status: &str) {
        if let Some(subscription) = self.state().subscriptions.get_mut(subscription_id) {
            subscription.status = status.to_string();
        }
    }

    /// Add a customer whose metadata names `external_user_id`.
    pub fn add_customer(&self, customer_id: &str, external_user_id: Option<&str>) {
        let Ok(id) = PaymentCustomerId::new(customer_id) else {
            return;
        };
        let mut metadata = HashMap::new();
        if let Some(user) = external_user_id {
            metadata.insert(USER_METADATA_KEY.to_string(), user.to_string());
        }
        self.state()
            .customers
            .insert(customer_id.to_string(), GatewayCustomer { id, metadata });
    }

    /// Queue an event to return from the next webhook verification.
    pub fn push_webhook_event(&self, event: LifecycleEvent) {
        self.state().webhook_events.push_back(event);
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: PaymentError) {
        self.state().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state()
            .method_errors
            .insert(method.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
    }

    /// Delay every gateway call by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    /// Get all recorded method calls.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    /// Check if a method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    /// Get count of calls to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    async fn enter(&self, method: &str, args: Vec<String>) -> Result<(), PaymentError> {
        let delay = {
            let mut state = self.state();
            state.call_log.push(MethodCall {
                method: method.to_string(),
                args,
            });
            state.delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<PaymentCustomerId, PaymentError> {
        self.enter(
            "create_customer",
            vec![request.external_user_id.to_string(), request.name.clone()],
        )
        .await?;

        let mut state = self.state();
        state.customer_seq += 1;
        let raw = format!("cus_mock_{}", state.customer_seq);
        let id = PaymentCustomerId::new(raw.as_str())
            .map_err(|_| PaymentError::provider("empty customer id"))?;

        let mut metadata = HashMap::new();
        metadata.insert(
            USER_METADATA_KEY.to_string(),
            request.external_user_id.to_string(),
        );
        state.customers.insert(
            raw,
            GatewayCustomer {
                id: id.clone(),
                metadata,
            },
        );

        Ok(id)
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutLink, PaymentError> {
        self.enter(
            "create_checkout_session",
            vec![
                request.customer_id.to_string(),
                request.external_user_id.to_string(),
            ],
        )
        .await?;

        let session_id = format!("cs_mock_{}", request.external_user_id);
        Ok(CheckoutLink {
            url: format!("https://checkout.stripe.com/c/pay/{}", session_id),
            session_id,
            expires_at: Some(Timestamp::now().plus_secs(24 * 60 * 60)),
        })
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<GatewaySubscription>, PaymentError> {
        self.enter("retrieve_subscription", vec![subscription_id.to_string()])
            .await?;
        Ok(self.state().subscriptions.get(subscription_id).cloned())
    }

    async fn retrieve_customer(
        &self,
        customer_id: &PaymentCustomerId,
    ) -> Result<Option<GatewayCustomer>, PaymentError> {
        self.enter("retrieve_customer", vec![customer_id.to_string()])
            .await?;
        Ok(self.state().customers.get(customer_id.as_str()).cloned())
    }

    async fn create_portal_session(
        &self,
        customer_id: &PaymentCustomerId,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        self.enter(
            "create_portal_session",
            vec![customer_id.to_string(), return_url.to_string()],
        )
        .await?;

        Ok(PortalSession {
            id: format!("bps_mock_{}", customer_id),
            url: format!("https://billing.stripe.com/p/session/{}", customer_id),
        })
    }

    async fn verify_webhook_signature(
        &self,
        _payload: &[u8],
        signature_header: &str,
    ) -> Result<LifecycleEvent, WebhookError> {
        let mut state = self.state();
        state.call_log.push(MethodCall {
            method: "verify_webhook_signature".to_string(),
            args: vec![signature_header.to_string()],
        });

        if state.reject_webhooks {
            return Err(WebhookError::InvalidSignature);
        }

        state
            .webhook_events
            .pop_front()
            .ok_or_else(|| WebhookError::ParseError("No webhook event queued".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ExternalUserId;
    use crate::domain::subscriber::LifecycleEventKind;

    #[tokio::test]
    async fn create_customer_records_metadata() {
        let mock = MockPaymentGateway::new();
        let id = mock
            .create_customer(CreateCustomerRequest {
                external_user_id: ExternalUserId::new("42").unwrap(),
                name: "Ada".to_string(),
                username: None,
            })
            .await
            .unwrap();

        let customer = mock.retrieve_customer(&id).await.unwrap().unwrap();
        assert_eq!(customer.external_user_id().unwrap().as_str(), "42");
        assert_eq!(mock.call_count("create_customer"), 1);
    }

    #[tokio::test]
    async fn method_error_is_sticky() {
        let mock = MockPaymentGateway::new();
        mock.set_method_error("retrieve_subscription", PaymentError::network("down"));

        assert!(mock.retrieve_subscription("sub_1").await.is_err());
        assert!(mock.retrieve_subscription("sub_1").await.is_err());

        mock.clear_errors();
        assert!(mock.retrieve_subscription("sub_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn global_error_is_consumed() {
        let mock = MockPaymentGateway::new();
        mock.set_error(PaymentError::timeout("any"));

        assert!(mock.retrieve_subscription("sub_1").await.is_err());
        assert!(mock.retrieve_subscription("sub_1").await.is_ok());
    }

    #[tokio::test]
    async fn queued_webhook_events_are_returned_in_order() {
        let mock = MockPaymentGateway::new();
        for id in ["evt_1", "evt_2"] {
            mock.push_webhook_event(LifecycleEvent {
                event_id: id.to_string(),
                occurred_at: Timestamp::now(),
                kind: LifecycleEventKind::Unhandled {
                    event_type: "invoice.paid".to_string(),
                },
            });
        }

        assert_eq!(mock.verify_webhook_signature(b"{}", "sig").await.unwrap().event_id, "evt_1");
        assert_eq!(mock.verify_webhook_signature(b"{}", "sig").await.unwrap().event_id, "evt_2");
        assert!(mock.verify_webhook_signature(b"{}", "sig").await.is_err());
    }

    #[tokio::test]
    async fn rejecting_mock_fails_verification() {
        let mock = MockPaymentGateway::rejecting_webhooks();
        assert!(matches!(
            mock.verify_webhook_signature(b"{}", "sig").await,
            Err(WebhookError::InvalidSignature)
        ));
    }
}
