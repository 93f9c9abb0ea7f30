//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the application to external systems:
//! - `http` - Axum routes for webhooks, the billing portal and video access
//! - `memory` - In-memory stores for local development and tests
//! - `postgres` - PostgreSQL stores
//! - `stripe` - Stripe payment gateway (plus a mock)
//! - `telegram` - Bot dispatcher and group access management
//! - `video` - VdoCipher DRM playback credentials

pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;
pub mod telegram;
pub mod video;
