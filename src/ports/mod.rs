//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `UserRecordStore` - Subscriber records with version compare-and-set
//! - `ProcessedWebhookStore` - Webhook delivery deduplication
//!
//! ## External Service Ports
//!
//! - `PaymentGateway` - Customers, checkout, subscription read-back, webhooks
//! - `AccessNotifier` - Chat messages and private-group membership
//! - `VideoAccessProvider` - DRM playback OTPs

mod access_notifier;
mod payment_gateway;
mod processed_webhook_store;
mod user_record_store;
mod video_access_provider;

pub use access_notifier::{AccessNotifier, NotifierError};
pub use payment_gateway::{
    CheckoutLink, CreateCheckoutRequest, CreateCustomerRequest, GatewayCustomer,
    GatewaySubscription, PaymentError, PaymentErrorCode, PaymentGateway, PortalSession,
    USER_METADATA_KEY,
};
pub use processed_webhook_store::{
    ProcessedWebhookRecord, ProcessedWebhookStore, SaveResult, WebhookOutcome,
};
pub use user_record_store::UserRecordStore;
pub use video_access_provider::{VideoAccessProvider, VideoError, VideoOtp};
