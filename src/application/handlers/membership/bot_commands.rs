//! BotCommandHandler - Chat command handling independent of the chat platform.
//!
//! Produces `BotReply` values; the Telegram adapter renders them.

use std::sync::Arc;
use std::time::Duration;

use crate::application::reconciler::{ReconcileError, SubscriptionReconciler};
use crate::domain::foundation::ExternalUserId;
use crate::domain::subscriber::{SubscriberRecord, SubscriptionStatus};
use crate::ports::PaymentGateway;

/// Callback data carried by the "Subscribe" button.
pub const SUBSCRIBE_ACTION: &str = "subscribe";

/// The chat user issuing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotUser {
    pub id: ExternalUserId,
    pub username: Option<String>,
    pub display_name: String,
}

/// Button attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyAction {
    None,
    /// Callback button that triggers `SUBSCRIBE_ACTION`.
    Subscribe,
    /// Button that opens a URL.
    OpenLink { label: String, url: String },
}

/// Platform-neutral chat reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotReply {
    pub text: String,
    pub action: ReplyAction,
}

impl BotReply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: ReplyAction::None,
        }
    }

    fn with_action(text: impl Into<String>, action: ReplyAction) -> Self {
        Self {
            text: text.into(),
            action,
        }
    }

    fn gateway_unavailable() -> Self {
        Self::text("Sorry, the payment service is not reachable right now. Please try again in a few minutes.")
    }

    fn internal_error() -> Self {
        Self::text("Something went wrong on our side. Please try again later.")
    }

    fn from_error(err: &ReconcileError) -> Self {
        match err {
            ReconcileError::GatewayUnavailable(_) => Self::gateway_unavailable(),
            _ => Self::internal_error(),
        }
    }
}

/// Handles `/start`, `/status` and the subscribe callback.
pub struct BotCommandHandler {
    reconciler: Arc<SubscriptionReconciler>,
    gateway: Arc<dyn PaymentGateway>,
    portal_return_url: String,
    gateway_timeout: Duration,
}

impl BotCommandHandler {
    pub fn new(
        reconciler: Arc<SubscriptionReconciler>,
        gateway: Arc<dyn PaymentGateway>,
        portal_return_url: impl Into<String>,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            reconciler,
            gateway,
            portal_return_url: portal_return_url.into(),
            gateway_timeout,
        }
    }

    /// `/start`: register the user and report where they stand.
    pub async fn start(&self, user: &BotUser) -> BotReply {
        let record = match self
            .reconciler
            .ensure_user(&user.id, user.username.clone(), &user.display_name)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(external_user_id = %user.id, error = %e, "/start failed");
                return BotReply::from_error(&e);
            }
        };

        match record.status {
            SubscriptionStatus::Active => {
                let text = format!(
                    "Hi {}! Your subscription is active until {}.",
                    user.display_name,
                    period_end_text(&record)
                );
                match self.portal_link(&record).await {
                    Some(url) => BotReply::with_action(
                        text,
                        ReplyAction::OpenLink {
                            label: "Manage subscription".to_string(),
                            url,
                        },
                    ),
                    None => BotReply::text(text),
                }
            }
            SubscriptionStatus::Cancelled => BotReply::with_action(
                format!(
                    "Welcome back, {}! Your subscription has ended. Subscribe again to regain access to the private group.",
                    user.display_name
                ),
                ReplyAction::Subscribe,
            ),
            SubscriptionStatus::Inactive => BotReply::with_action(
                format!(
                    "Hi {}! A subscription gives you access to the private members group and video library.",
                    user.display_name
                ),
                ReplyAction::Subscribe,
            ),
        }
    }

    /// `/status`: read-only; never creates a record.
    pub async fn status(&self, user: &ExternalUserId) -> BotReply {
        match self.reconciler.current_status(user).await {
            Ok(record) => BotReply::text(match record.status {
                SubscriptionStatus::Active => format!(
                    "Status: active until {}.",
                    period_end_text(&record)
                ),
                SubscriptionStatus::Cancelled => "Status: cancelled. Send /start to subscribe again.".to_string(),
                SubscriptionStatus::Inactive => "Status: not subscribed. Send /start to subscribe.".to_string(),
            }),
            Err(ReconcileError::NotFound(_)) => {
                BotReply::text("You have not signed up yet. Send /start to begin.")
            }
            Err(e) => {
                tracing::warn!(external_user_id = %user, error = %e, "/status failed");
                BotReply::from_error(&e)
            }
        }
    }

    /// Subscribe button: hand out a checkout link unless already active.
    pub async fn subscribe(&self, user: &BotUser) -> BotReply {
        match self.reconciler.current_status(&user.id).await {
            Ok(record) if record.is_entitled() => {
                return BotReply::text(format!(
                    "Your subscription is already active until {}.",
                    period_end_text(&record)
                ));
            }
            Ok(_) | Err(ReconcileError::NotFound(_)) => {}
            Err(e) => return BotReply::from_error(&e),
        }

        match self
            .reconciler
            .begin_checkout(&user.id, user.username.clone(), &user.display_name)
            .await
        {
            Ok(link) => BotReply::with_action(
                "Complete your payment on the secure checkout page. You will get your invite link here as soon as it goes through.",
                ReplyAction::OpenLink {
                    label: "Pay now".to_string(),
                    url: link.url,
                },
            ),
            Err(e) => {
                tracing::warn!(external_user_id = %user.id, error = %e, "Checkout could not be started");
                BotReply::from_error(&e)
            }
        }
    }

    async fn portal_link(&self, record: &SubscriberRecord) -> Option<String> {
        let call = self
            .gateway
            .create_portal_session(&record.payment_customer_id, &self.portal_return_url);
        match tokio::time::timeout(self.gateway_timeout, call).await {
            Ok(Ok(session)) => Some(session.url),
            Ok(Err(e)) => {
                tracing::warn!(external_user_id = %record.external_user_id, error = %e, "Portal link unavailable");
                None
            }
            Err(_) => {
                tracing::warn!(external_user_id = %record.external_user_id, "Portal link timed out");
                None
            }
        }
    }
}

fn period_end_text(record: &SubscriberRecord) -> String {
    record
        .period_end
        .map(|t| t.to_date_string())
        .unwrap_or_else(|| "the end of the current period".to_string())
}
