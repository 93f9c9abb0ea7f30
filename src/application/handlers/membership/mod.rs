//! Membership handlers.
//!
//! Entry points that sit between the outer surfaces (HTTP, chat) and the
//! subscription reconciler:
//!
//! ## Commands
//! - Processing payment webhooks
//! - Chat commands (`/start`, subscribe)
//!
//! ## Queries
//! - Billing portal sessions
//! - Video access checks
//! - Chat `/status`

mod bot_commands;
mod handle_payment_webhook;
mod open_billing_portal;
mod verify_video_access;

// Commands
pub use bot_commands::{BotCommandHandler, BotReply, BotUser, ReplyAction, SUBSCRIBE_ACTION};
pub use handle_payment_webhook::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, HandlePaymentWebhookResult,
};

// Queries
pub use open_billing_portal::{OpenBillingPortalHandler, OpenBillingPortalQuery};
pub use verify_video_access::{
    VerifyVideoAccessHandler, VerifyVideoAccessQuery, VerifyVideoAccessResult, VideoAccessDenial,
};
