//! Axum router configuration for membership endpoints.

use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    handle_payment_webhook, index, open_billing_portal, verify_and_get_video, MembershipAppState,
};

/// Create the membership API router.
///
/// # Routes
///
/// ## Gateway Endpoints (no auth, signature verified)
/// - `POST /payment-webhook` - Handle payment gateway webhooks
///
/// ## User Endpoints
/// - `GET /portal/:customer_id` - Redirect to the billing portal
/// - `POST /verify-and-get-video/:video_id` - Issue a playback OTP
///
/// ## Operations
/// - `GET /` - Liveness check
pub fn membership_routes() -> Router<MembershipAppState> {
    Router::new()
        .route("/", get(index))
        .route("/payment-webhook", post(handle_payment_webhook))
        .route("/portal/:customer_id", get(open_billing_portal))
        .route("/verify-and-get-video/:video_id", post(verify_and_get_video))
}

/// Create the complete application router with tracing and a request timeout.
///
/// # Example
///
/// ```ignore
/// let app = membership_router(state, Duration::from_secs(30));
/// axum::serve(listener, app).await?;
/// ```
pub fn membership_router(state: MembershipAppState, request_timeout: Duration) -> Router {
    membership_routes()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
