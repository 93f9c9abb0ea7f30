//! Stripe payment gateway adapter.
//!
//! Implements the `PaymentGateway` trait against the Stripe REST API.
//! Handles customers, checkout sessions, subscription read-back, billing
//! portal sessions, and webhook verification.
//!
//! # Security
//!
//! - HMAC-SHA256 signature verification with constant-time comparison
//! - Timestamp validation (5-minute window) for replay attack prevention
//! - Secrets handled via `secrecy::SecretString`
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key, webhook_secret, price_id)
//!     .with_redirect_urls(success_url, cancel_url);
//! let gateway = StripePaymentGateway::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::foundation::{ExternalUserId, PaymentCustomerId, Timestamp};
use crate::domain::subscriber::{
    LifecycleEvent, LifecycleEventKind, CHECKOUT_COMPLETED, INVOICE_PAYMENT_FAILED,
    SUBSCRIPTION_DELETED,
};
use crate::domain::webhook::WebhookError;
use crate::ports::{
    CheckoutLink, CreateCheckoutRequest, CreateCustomerRequest, GatewayCustomer,
    GatewaySubscription, PaymentError, PaymentErrorCode, PaymentGateway, PortalSession,
    USER_METADATA_KEY,
};

use super::webhook_types::{
    SignatureHeader, StripeCheckoutSession, StripeCustomer, StripeErrorResponse, StripeInvoice,
    StripePortalSession, StripeSubscription, StripeWebhookEvent,
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Default per-request timeout for Stripe API calls.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    /// Price of the single subscription product (price_...).
    price_id: String,

    /// Where Stripe sends the user after paying.
    success_url: String,

    /// Where Stripe sends the user after abandoning checkout.
    cancel_url: String,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Whether to reject test-mode events.
    require_livemode: bool,

    /// Per-request timeout.
    request_timeout: Duration,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(
        api_key: impl Into<String>,
        webhook_secret: impl Into<String>,
        price_id: impl Into<String>,
    ) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            price_id: price_id.into(),
            success_url: "https://t.me".to_string(),
            cancel_url: "https://t.me".to_string(),
            api_base_url: "https://api.stripe.com".to_string(),
            require_livemode: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the checkout redirect URLs.
    pub fn with_redirect_urls(
        mut self,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        self.success_url = success_url.into();
        self.cancel_url = cancel_url.into();
        self
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Require livemode events in production.
    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Stripe payment gateway adapter.
pub struct StripePaymentGateway {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentGateway {
    /// Create a new Stripe adapter with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PaymentError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    /// Verify webhook signature using HMAC-SHA256.
    ///
    /// # Security
    ///
    /// - Uses constant-time comparison to prevent timing attacks
    /// - Validates timestamp to prevent replay attacks
    fn verify_signature(&self, payload: &[u8], header: &SignatureHeader) -> Result<(), WebhookError> {
        // 1. Validate timestamp (prevent replay attacks)
        let now = chrono::Utc::now().timestamp();
        let age = now - header.timestamp;

        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                age_secs = age,
                "Webhook event too old - possible replay attack"
            );
            return Err(WebhookError::TimestampOutOfRange);
        }

        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook event from future - clock skew or manipulation"
            );
            return Err(WebhookError::InvalidTimestamp);
        }

        // 2. Compute expected signature over "{timestamp}.{payload}"
        let mut mac = HmacSha256::new_from_slice(
            self.config.webhook_secret.expose_secret().as_bytes(),
        )
        .map_err(|_| WebhookError::InvalidSignature)?;

        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        // 3. Constant-time comparison against every v1 candidate
        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| expected.as_slice().ct_eq(candidate.as_slice()).into());

        if !matched {
            tracing::warn!(
                signatures = header.v1_signatures.len(),
                "Invalid webhook signature"
            );
            return Err(WebhookError::InvalidSignature);
        }

        Ok(())
    }

    /// Parse a verified Stripe event into a lifecycle event.
    fn parse_event(&self, payload: &[u8]) -> Result<LifecycleEvent, WebhookError> {
        let stripe_event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse webhook payload");
            WebhookError::ParseError(format!("Invalid JSON: {}", e))
        })?;

        if self.config.require_livemode && !stripe_event.livemode {
            tracing::warn!(
                event_id = %stripe_event.id,
                "Rejected test mode event in production"
            );
            return Err(WebhookError::LivemodeMismatch);
        }

        let occurred_at =
            Timestamp::from_unix_secs(stripe_event.created).ok_or(WebhookError::InvalidTimestamp)?;
        let kind = extract_event_kind(&stripe_event)?;

        Ok(LifecycleEvent {
            event_id: stripe_event.id,
            occurred_at,
            kind,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        operation: &'static str,
    ) -> Result<Option<T>, PaymentError> {
        let response = self
            .http_client
            .get(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| send_error(e, operation))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        parse_response(response, operation).await.map(Some)
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
        operation: &'static str,
    ) -> Result<T, PaymentError> {
        let response = self
            .http_client
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(|e| send_error(e, operation))?;

        parse_response(response, operation).await
    }
}

/// Extract the entitlement-relevant part of a Stripe event.
fn extract_event_kind(event: &StripeWebhookEvent) -> Result<LifecycleEventKind, WebhookError> {
    match event.event_type.as_str() {
        CHECKOUT_COMPLETED => {
            let session: StripeCheckoutSession = serde_json::from_value(event.data.object.clone())
                .map_err(|e| WebhookError::ParseError(format!("Invalid checkout session: {}", e)))?;

            // One-off payment sessions carry no subscription and grant nothing.
            let Some(subscription_id) = session.subscription else {
                return Ok(LifecycleEventKind::Unhandled {
                    event_type: event.event_type.clone(),
                });
            };

            Ok(LifecycleEventKind::CheckoutCompleted {
                external_user_id: metadata_user(&session.metadata),
                customer_id: session.customer.and_then(|c| PaymentCustomerId::new(c).ok()),
                subscription_id,
            })
        }

        SUBSCRIPTION_DELETED => {
            let sub: StripeSubscription = serde_json::from_value(event.data.object.clone())
                .map_err(|e| WebhookError::ParseError(format!("Invalid subscription: {}", e)))?;

            Ok(LifecycleEventKind::SubscriptionDeleted {
                customer_id: PaymentCustomerId::new(sub.customer)
                    .map_err(|_| WebhookError::MissingField("customer"))?,
                external_user_id: metadata_user(&sub.metadata),
                subscription_id: sub.id,
            })
        }

        INVOICE_PAYMENT_FAILED => {
            let invoice: StripeInvoice = serde_json::from_value(event.data.object.clone())
                .map_err(|e| WebhookError::ParseError(format!("Invalid invoice: {}", e)))?;

            Ok(LifecycleEventKind::InvoicePaymentFailed {
                customer_id: PaymentCustomerId::new(invoice.customer)
                    .map_err(|_| WebhookError::MissingField("customer"))?,
                subscription_id: invoice.subscription,
            })
        }

        other => Ok(LifecycleEventKind::Unhandled {
            event_type: other.to_string(),
        }),
    }
}

fn metadata_user(metadata: &std::collections::HashMap<String, String>) -> Option<ExternalUserId> {
    metadata
        .get(USER_METADATA_KEY)
        .and_then(|value| ExternalUserId::new(value.as_str()).ok())
}

fn send_error(err: reqwest::Error, operation: &'static str) -> PaymentError {
    if err.is_timeout() {
        PaymentError::timeout(operation)
    } else {
        PaymentError::network(format!("{}: {}", operation, err))
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<T, PaymentError> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(
            operation,
            status = status.as_u16(),
            error = %error_text,
            "Stripe API call failed"
        );

        let mut error = PaymentError::new(
            PaymentErrorCode::from_http_status(status.as_u16()),
            format!("Stripe API error during {}", operation),
        );
        if let Ok(body) = serde_json::from_str::<StripeErrorResponse>(&error_text) {
            if let Some(message) = body.error.message {
                error.message = format!("Stripe API error during {}: {}", operation, message);
            }
            if let Some(code) = body.error.code.or(body.error.error_type) {
                error = error.with_provider_code(code);
            }
        }
        return Err(error);
    }

    response.json().await.map_err(|e| {
        PaymentError::provider(format!("Failed to parse Stripe {} response: {}", operation, e))
    })
}

#[async_trait]
impl PaymentGateway for StripePaymentGateway {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<PaymentCustomerId, PaymentError> {
        let mut params = vec![
            ("name", request.name.clone()),
            (
                "metadata[external_user_id]",
                request.external_user_id.to_string(),
            ),
        ];

        if let Some(username) = &request.username {
            params.push(("metadata[username]", username.clone()));
        }

        let customer: StripeCustomer = self
            .post_form("/v1/customers", &params, "create_customer")
            .await?;

        PaymentCustomerId::new(customer.id)
            .map_err(|_| PaymentError::provider("Stripe returned an empty customer id"))
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutLink, PaymentError> {
        let user = request.external_user_id.to_string();
        let params = vec![
            ("mode", "subscription".to_string()),
            ("customer", request.customer_id.to_string()),
            ("line_items[0][price]", self.config.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("success_url", self.config.success_url.clone()),
            ("cancel_url", self.config.cancel_url.clone()),
            ("client_reference_id", user.clone()),
            ("metadata[external_user_id]", user.clone()),
            ("subscription_data[metadata][external_user_id]", user),
        ];

        let session: StripeCheckoutSession = self
            .post_form("/v1/checkout/sessions", &params, "create_checkout_session")
            .await?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::provider("Checkout session has no URL"))?;

        Ok(CheckoutLink {
            url,
            session_id: session.id,
            expires_at: session.expires_at.and_then(Timestamp::from_unix_secs),
        })
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<GatewaySubscription>, PaymentError> {
        let path = format!("/v1/subscriptions/{}", subscription_id);
        let Some(sub) = self
            .get_json::<StripeSubscription>(&path, "retrieve_subscription")
            .await?
        else {
            return Ok(None);
        };

        let current_period_end = sub
            .period_end()
            .and_then(Timestamp::from_unix_secs)
            .ok_or_else(|| PaymentError::provider("Subscription has no period end"))?;
        let customer_id = PaymentCustomerId::new(sub.customer)
            .map_err(|_| PaymentError::provider("Subscription has no customer"))?;

        Ok(Some(GatewaySubscription {
            id: sub.id,
            customer_id,
            status: sub.status,
            current_period_end,
        }))
    }

    async fn retrieve_customer(
        &self,
        customer_id: &PaymentCustomerId,
    ) -> Result<Option<GatewayCustomer>, PaymentError> {
        let path = format!("/v1/customers/{}", customer_id);
        let customer = self
            .get_json::<StripeCustomer>(&path, "retrieve_customer")
            .await?;

        Ok(customer
            .filter(|c| !c.deleted)
            .map(|c| GatewayCustomer {
                id: customer_id.clone(),
                metadata: c.metadata,
            }))
    }

    async fn create_portal_session(
        &self,
        customer_id: &PaymentCustomerId,
        return_url: &str,
    ) -> Result<PortalSession, PaymentError> {
        let params = vec![
            ("customer", customer_id.to_string()),
            ("return_url", return_url.to_string()),
        ];

        let portal: StripePortalSession = self
            .post_form("/v1/billing_portal/sessions", &params, "create_portal_session")
            .await?;

        Ok(PortalSession {
            id: portal.id,
            url: portal.url,
        })
    }

    async fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<LifecycleEvent, WebhookError> {
        // 1. Parse signature header
        let header = SignatureHeader::parse(signature_header).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Stripe-Signature header");
            WebhookError::ParseError(e.to_string())
        })?;

        // 2. Verify signature (includes timestamp validation)
        self.verify_signature(payload, &header)?;

        // 3. Parse and convert event
        let event = self.parse_event(payload)?;

        tracing::info!(
            event_id = %event.event_id,
            event_type = event.event_type(),
            "Webhook signature verified"
        );

        Ok(event)
    }
}

/// Builds a valid `Stripe-Signature` header for `payload`.
///
/// Used by tests and local tooling that replay webhooks against the server.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    use super::webhook_types::hex_encode;

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return format!("t={}", timestamp),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!(
        "t={},v1={}",
        timestamp,
        hex_encode(&mac.finalize().into_bytes())
    )
}
