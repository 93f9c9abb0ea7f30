//! HTTP adapters - Axum routes exposing the application to the outside world.

pub mod membership;

pub use membership::{membership_router, MembershipAppState};
