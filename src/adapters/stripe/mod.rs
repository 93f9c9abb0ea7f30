//! Stripe payment gateway adapter.
//!
//! Implements the `PaymentGateway` port for Stripe, including:
//! - Customer creation with the external user id in metadata
//! - Subscription checkout sessions
//! - Subscription and customer read-back
//! - Billing portal sessions
//! - Webhook signature verification
//!
//! # Security
//!
//! - Webhook signatures use HMAC-SHA256 with constant-time comparison
//! - Timestamps are validated to prevent replay attacks (5-minute window)
//! - All secrets are handled via `secrecy::SecretString`

mod mock_payment_gateway;
mod stripe_adapter;
mod webhook_types;

pub use mock_payment_gateway::{MethodCall, MockPaymentGateway};
pub use stripe_adapter::{sign_payload, StripeConfig, StripePaymentGateway};
pub use webhook_types::{
    SignatureHeader, SignatureParseError, StripeCheckoutSession, StripeCustomer, StripeInvoice,
    StripeSubscription, StripeWebhookEvent,
};
