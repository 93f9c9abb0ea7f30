//! Reconciler error taxonomy.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ExternalUserId};
use crate::ports::PaymentError;

/// Errors from reconciler operations.
#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// The payment gateway failed or did not answer in time.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(PaymentError),

    /// No local subscriber matches the event.
    #[error("No subscriber matches {reference}")]
    UnresolvedSubscriber { reference: String },

    /// The operation requires a subscriber that does not exist.
    #[error("Subscriber {0} not found")]
    NotFound(ExternalUserId),

    /// The record store failed.
    #[error("Store error: {0}")]
    Store(DomainError),

    /// A store call did not complete in time.
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },
}

impl ReconcileError {
    /// Returns true if repeating the request may succeed.
    ///
    /// Gateway failures always count: a paid checkout must not be dropped
    /// because the read-back failed once.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconcileError::GatewayUnavailable(_) | ReconcileError::Timeout { .. } => true,
            ReconcileError::Store(e) => e.code.is_transient(),
            ReconcileError::UnresolvedSubscriber { .. } | ReconcileError::NotFound(_) => false,
        }
    }
}

impl From<DomainError> for ReconcileError {
    fn from(err: DomainError) -> Self {
        ReconcileError::Store(err)
    }
}
