//! Payment webhook domain types.

mod webhook_errors;

pub use webhook_errors::WebhookError;
