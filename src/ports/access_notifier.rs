//! Access notifier port for the chat platform.
//!
//! Messaging and private-group membership. Every operation is best effort:
//! a failure here is logged by the caller and never reverses an entitlement
//! change.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::ExternalUserId;

/// Port for user-facing notifications and group membership.
#[async_trait]
pub trait AccessNotifier: Send + Sync {
    /// Send a plain text message to a user.
    async fn send_message(&self, user: &ExternalUserId, text: &str) -> Result<(), NotifierError>;

    /// Obtain an invite link to the private group for `user`.
    async fn grant_group_access(&self, user: &ExternalUserId) -> Result<String, NotifierError>;

    /// Remove `user` from the private group without a permanent ban.
    async fn revoke_group_access(&self, user: &ExternalUserId) -> Result<(), NotifierError>;
}

/// Notification failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifierError {
    /// The user id cannot be addressed on the chat platform.
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    /// The platform rejected or failed the request.
    #[error("Chat platform error: {0}")]
    Platform(String),

    /// The call did not complete in time.
    #[error("Notification timed out: {0}")]
    Timeout(&'static str),
}
