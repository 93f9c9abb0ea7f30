//! HTTP handlers for membership endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};

use crate::application::handlers::membership::{
    HandlePaymentWebhookCommand, HandlePaymentWebhookHandler, OpenBillingPortalHandler,
    OpenBillingPortalQuery, VerifyVideoAccessHandler, VerifyVideoAccessQuery,
    VerifyVideoAccessResult,
};
use crate::domain::webhook::WebhookError;
use crate::ports::PaymentError;

use super::dto::{ErrorResponse, VideoAccessRequest, VideoOtpResponse, WebhookAck};

/// Header carrying the Stripe webhook signature.
pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state.
///
/// Cloned per request; every handler sits behind an `Arc`.
#[derive(Clone)]
pub struct MembershipAppState {
    pub webhook_handler: Arc<HandlePaymentWebhookHandler>,
    pub portal_handler: Arc<OpenBillingPortalHandler>,
    pub video_handler: Arc<VerifyVideoAccessHandler>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// GET / - Liveness check
pub async fn index() -> &'static str {
    "member-gate is running"
}

/// POST /payment-webhook - Handle payment gateway webhooks
pub async fn handle_payment_webhook(
    State(state): State<MembershipAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, MembershipApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = HandlePaymentWebhookCommand {
        payload: body.to_vec(),
        signature,
    };

    let result = state.webhook_handler.handle(cmd).await?;
    tracing::debug!(result = ?result, "Webhook acknowledged");

    Ok(Json(WebhookAck::received()))
}

/// GET /portal/:customer_id - Redirect to the billing portal
pub async fn open_billing_portal(
    State(state): State<MembershipAppState>,
    Path(customer_id): Path<String>,
) -> Result<Redirect, MembershipApiError> {
    let session = state
        .portal_handler
        .handle(OpenBillingPortalQuery { customer_id })
        .await?;

    Ok(Redirect::to(&session.url))
}

/// POST /verify-and-get-video/:video_id - Issue a playback OTP to subscribers
///
/// Always answers 200; refusals carry an `error` field the player shows.
pub async fn verify_and_get_video(
    State(state): State<MembershipAppState>,
    Path(video_id): Path<String>,
    body: Bytes,
) -> Response {
    let request: VideoAccessRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(video_id = %video_id, error = %e, "Malformed video access request");
            return Json(ErrorResponse::new("Invalid request")).into_response();
        }
    };

    let query = VerifyVideoAccessQuery {
        video_id,
        user_id: request.user_id,
    };

    match state.video_handler.handle(query).await {
        VerifyVideoAccessResult::Granted(otp) => Json(VideoOtpResponse::from(otp)).into_response(),
        VerifyVideoAccessResult::Denied(denial) => {
            Json(ErrorResponse::new(denial.message())).into_response()
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts application errors to HTTP responses.
#[derive(Debug)]
pub enum MembershipApiError {
    Webhook(WebhookError),
    Portal(PaymentError),
}

impl From<WebhookError> for MembershipApiError {
    fn from(err: WebhookError) -> Self {
        Self::Webhook(err)
    }
}

impl From<PaymentError> for MembershipApiError {
    fn from(err: PaymentError) -> Self {
        Self::Portal(err)
    }
}

impl IntoResponse for MembershipApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            MembershipApiError::Webhook(e) if e.is_rejection() => {
                (e.status_code(), e.to_string())
            }
            MembershipApiError::Webhook(e) => {
                (e.status_code(), "Webhook could not be processed".to_string())
            }
            MembershipApiError::Portal(e) => {
                tracing::warn!(error = %e, "Billing portal unavailable");
                (
                    StatusCode::BAD_GATEWAY,
                    "Billing portal is unavailable".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
