//! HTTP adapter for membership endpoints.
//!
//! Exposes the membership flows via HTTP:
//! - `POST /payment-webhook` - Handle Stripe webhooks
//! - `GET /portal/:customer_id` - Redirect to the Stripe billing portal
//! - `POST /verify-and-get-video/:video_id` - DRM playback credential for subscribers
//! - `GET /` - Liveness check

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{MembershipApiError, MembershipAppState, SIGNATURE_HEADER};
pub use routes::{membership_router, membership_routes};
