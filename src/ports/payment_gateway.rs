//! Payment gateway port for external payment processing.
//!
//! Defines the contract the reconciler needs from the card-payment provider
//! (e.g., Stripe): customers, checkout sessions, subscription read-back,
//! billing portal links, and webhook verification.
//!
//! # Design
//!
//! - **Gateway is the source of truth**: period ends are always read back,
//!   never computed locally
//! - **Verification first**: a webhook payload becomes a `LifecycleEvent`
//!   only after its signature checks out

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DomainError, ErrorCode, ExternalUserId, PaymentCustomerId, Timestamp,
};
use crate::domain::subscriber::LifecycleEvent;
use crate::domain::webhook::WebhookError;

/// Metadata key under which the external user id travels through the gateway.
pub const USER_METADATA_KEY: &str = "external_user_id";

/// Port for payment gateway integrations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a customer in the payment system.
    ///
    /// Returns the gateway's customer ID for future reference.
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<PaymentCustomerId, PaymentError>;

    /// Create a checkout session for the single subscription product.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutLink, PaymentError>;

    /// Read back a subscription, including its authoritative period end.
    ///
    /// Returns `None` if the gateway has no such subscription.
    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<GatewaySubscription>, PaymentError>;

    /// Read back a customer and its metadata.
    ///
    /// Returns `None` if the customer does not exist or was deleted.
    async fn retrieve_customer(
        &self,
        customer_id: &PaymentCustomerId,
    ) -> Result<Option<GatewayCustomer>, PaymentError>;

    /// Create a billing portal session for self-service management.
    async fn create_portal_session(
        &self,
        customer_id: &PaymentCustomerId,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError>;

    /// Verify a webhook signature and parse the event.
    ///
    /// Nothing about the payload may be trusted unless this returns `Ok`.
    async fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<LifecycleEvent, WebhookError>;
}

/// Request to create a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    /// Stored as customer metadata for reverse resolution.
    pub external_user_id: ExternalUserId,

    /// Customer display name.
    pub name: String,

    /// Chat platform username, stored as metadata when present.
    pub username: Option<String>,
}

/// Request to create a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCheckoutRequest {
    /// Customer the session is scoped to.
    pub customer_id: PaymentCustomerId,

    /// Tagged onto the session and subscription metadata for correlation.
    pub external_user_id: ExternalUserId,
}

/// A time-limited link to a hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLink {
    pub url: String,
    pub session_id: String,
    pub expires_at: Option<Timestamp>,
}

/// Subscription as read back from the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySubscription {
    pub id: String,
    pub customer_id: PaymentCustomerId,

    /// Gateway status string (active, past_due, canceled, ...).
    pub status: String,

    /// Authoritative end of the paid period.
    pub current_period_end: Timestamp,
}

impl GatewaySubscription {
    /// True while the gateway still bills (or trials) the subscription.
    pub fn grants_access(&self) -> bool {
        matches!(self.status.as_str(), "active" | "trialing")
    }
}

/// Customer as read back from the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCustomer {
    pub id: PaymentCustomerId,
    pub metadata: HashMap<String, String>,
}

impl GatewayCustomer {
    /// External user id recorded when the customer was created.
    pub fn external_user_id(&self) -> Option<ExternalUserId> {
        self.metadata
            .get(USER_METADATA_KEY)
            .and_then(|value| ExternalUserId::new(value.as_str()).ok())
    }
}

/// Billing portal session for subscription management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSession {
    pub id: String,
    pub url: String,
}

/// Payment gateway error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Provider's error code (if available).
    pub provider_code: Option<String>,

    /// Whether the operation can be retried.
    pub retryable: bool,
}

impl PaymentError {
    /// Create a new payment error.
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    /// Attach the provider's own error code.
    pub fn with_provider_code(mut self, provider_code: impl Into<String>) -> Self {
        self.provider_code = Some(provider_code.into());
        self
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    /// Create a timeout error.
    pub fn timeout(operation: &str) -> Self {
        Self::new(
            PaymentErrorCode::Timeout,
            format!("{} timed out", operation),
        )
    }

    /// Create a not found error.
    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
    }

    /// Create a provider API error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        let code = match err.code {
            PaymentErrorCode::Timeout => ErrorCode::Timeout,
            _ => ErrorCode::ExternalServiceError,
        };
        DomainError::new(code, err.message)
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// Call did not complete in time.
    Timeout,

    /// API authentication failed.
    AuthenticationError,

    /// Resource not found.
    NotFound,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Request rejected as invalid by the provider.
    InvalidRequest,

    /// Provider API error.
    ProviderError,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::Timeout
                | PaymentErrorCode::RateLimitExceeded
                | PaymentErrorCode::ProviderError
        )
    }

    /// Maps an HTTP status returned by the provider to an error code.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 | 403 => PaymentErrorCode::AuthenticationError,
            404 => PaymentErrorCode::NotFound,
            429 => PaymentErrorCode::RateLimitExceeded,
            400..=499 => PaymentErrorCode::InvalidRequest,
            _ => PaymentErrorCode::ProviderError,
        }
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::Timeout => "timeout",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn PaymentGateway) {}
    }

    #[test]
    fn payment_error_retryable() {
        assert!(PaymentErrorCode::NetworkError.is_retryable());
        assert!(PaymentErrorCode::Timeout.is_retryable());
        assert!(PaymentErrorCode::RateLimitExceeded.is_retryable());

        assert!(!PaymentErrorCode::AuthenticationError.is_retryable());
        assert!(!PaymentErrorCode::NotFound.is_retryable());
    }

    #[test]
    fn only_billed_subscriptions_grant_access() {
        let subscription = |status: &str| GatewaySubscription {
            id: "sub_1".to_string(),
            customer_id: PaymentCustomerId::new("cus_1").unwrap(),
            status: status.to_string(),
            current_period_end: Timestamp::from_unix_secs(2_000_000).unwrap(),
        };

        assert!(subscription("active").grants_access());
        assert!(subscription("trialing").grants_access());
        for status in ["canceled", "incomplete_expired", "unpaid", "incomplete"] {
            assert!(!subscription(status).grants_access(), "{status}");
        }
    }

    #[test]
    fn payment_error_display() {
        let err = PaymentError::network("connection reset");
        assert_eq!(err.to_string(), "network_error: connection reset");
    }

    #[test]
    fn http_status_maps_to_code() {
        assert_eq!(PaymentErrorCode::from_http_status(401), PaymentErrorCode::AuthenticationError);
        assert_eq!(PaymentErrorCode::from_http_status(404), PaymentErrorCode::NotFound);
        assert_eq!(PaymentErrorCode::from_http_status(429), PaymentErrorCode::RateLimitExceeded);
        assert_eq!(PaymentErrorCode::from_http_status(400), PaymentErrorCode::InvalidRequest);
        assert_eq!(PaymentErrorCode::from_http_status(502), PaymentErrorCode::ProviderError);
    }

    #[test]
    fn payment_error_converts_to_domain_error() {
        let domain_err: DomainError = PaymentError::timeout("create_customer").into();
        assert_eq!(domain_err.code, ErrorCode::Timeout);
        assert!(domain_err.message().contains("create_customer"));
    }

    #[test]
    fn customer_metadata_resolves_external_user() {
        let mut metadata = HashMap::new();
        metadata.insert(USER_METADATA_KEY.to_string(), "555".to_string());
        let customer = GatewayCustomer {
            id: PaymentCustomerId::new("cus_1").unwrap(),
            metadata,
        };
        assert_eq!(customer.external_user_id().unwrap().as_str(), "555");
    }

    #[test]
    fn customer_without_metadata_has_no_external_user() {
        let customer = GatewayCustomer {
            id: PaymentCustomerId::new("cus_1").unwrap(),
            metadata: HashMap::new(),
        };
        assert!(customer.external_user_id().is_none());
    }
}
