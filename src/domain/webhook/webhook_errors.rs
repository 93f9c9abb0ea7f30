//! Webhook error types for payment webhook handling.
//!
//! Every failure that can occur between receiving a webhook body and
//! acknowledging it, with HTTP status mapping and retryability semantics.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header absent from the request.
    #[error("Missing signature header")]
    MissingSignature,

    /// Webhook signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Webhook timestamp is outside the acceptable window (5 minutes).
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Event timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Failed to parse webhook payload or signature header.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required field missing from webhook payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Test-mode event delivered to a live deployment.
    #[error("Test mode events are not accepted")]
    LivemodeMismatch,

    /// An upstream collaborator failed while applying the event.
    #[error("Processing failed: {0}")]
    Unavailable(String),

    /// Processed-event bookkeeping failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    /// Returns true if the gateway should retry delivering this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Unavailable(_) | WebhookError::Database(_))
    }

    /// Returns true if the payload was rejected before reaching the reconciler.
    pub fn is_rejection(&self) -> bool {
        !self.is_retryable()
    }

    /// Maps the error to an HTTP status code.
    ///
    /// - 400: rejected payload, never retried usefully
    /// - 500: transient failure, the gateway retries with backoff
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MissingSignature
            | WebhookError::InvalidSignature
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp
            | WebhookError::ParseError(_)
            | WebhookError::MissingField(_)
            | WebhookError::LivemodeMismatch => StatusCode::BAD_REQUEST,

            WebhookError::Unavailable(_) | WebhookError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
