//! member-gate - Payment-gated community access
//!
//! Keeps a private Telegram group and a DRM video library in step with
//! Stripe subscriptions: checkouts grant access, renewals extend it,
//! cancellations revoke it.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod startup;
