//! HTTP DTOs (Data Transfer Objects) for the membership endpoints.
//!
//! Field names follow the wire contract used by the player page and the
//! payment gateway, not Rust conventions.

use serde::{Deserialize, Serialize};

use crate::ports::VideoOtp;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body of `POST /verify-and-get-video/:video_id`.
#[derive(Debug, Clone, Deserialize)]
pub struct VideoAccessRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Acknowledgment sent to the payment gateway.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WebhookAck {
    pub received: bool,
}

impl WebhookAck {
    pub fn received() -> Self {
        Self { received: true }
    }
}

/// Playback credential returned to the player.
#[derive(Debug, Clone, Serialize)]
pub struct VideoOtpResponse {
    pub otp: String,
    #[serde(rename = "playbackInfo")]
    pub playback_info: String,
}

impl From<VideoOtp> for VideoOtpResponse {
    fn from(otp: VideoOtp) -> Self {
        Self {
            otp: otp.otp,
            playback_info: otp.playback_info,
        }
    }
}

/// Error body shared by every endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_request_reads_camel_case_user_id() {
        let request: VideoAccessRequest = serde_json::from_str(r#"{"userId":"42"}"#).unwrap();
        assert_eq!(request.user_id, "42");
    }

    #[test]
    fn video_request_rejects_snake_case() {
        assert!(serde_json::from_str::<VideoAccessRequest>(r#"{"user_id":"42"}"#).is_err());
    }

    #[test]
    fn otp_response_uses_playback_info_key() {
        let response = VideoOtpResponse::from(VideoOtp {
            otp: "otp-1".to_string(),
            playback_info: "info-1".to_string(),
        });

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["otp"], "otp-1");
        assert_eq!(json["playbackInfo"], "info-1");
    }

    #[test]
    fn ack_serializes_received_flag() {
        let json = serde_json::to_string(&WebhookAck::received()).unwrap();
        assert_eq!(json, r#"{"received":true}"#);
    }

    #[test]
    fn error_response_has_single_error_key() {
        let json = serde_json::to_value(ErrorResponse::new("User not found")).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "User not found" }));
    }
}
