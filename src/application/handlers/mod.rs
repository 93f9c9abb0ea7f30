//! Application handlers.
//!
//! Command and query handlers that orchestrate the reconciler and ports.

pub mod membership;

pub use membership::{
    BotCommandHandler, BotReply, BotUser, HandlePaymentWebhookCommand,
    HandlePaymentWebhookHandler, HandlePaymentWebhookResult, OpenBillingPortalHandler,
    OpenBillingPortalQuery, ReplyAction, VerifyVideoAccessHandler, VerifyVideoAccessQuery,
    VerifyVideoAccessResult, VideoAccessDenial, SUBSCRIBE_ACTION,
};
