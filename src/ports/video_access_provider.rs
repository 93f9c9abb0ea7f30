//! Video access provider port.
//!
//! Issues short-lived playback credentials for DRM-protected videos. The
//! caller decides entitlement; the provider only mints tokens.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::ExternalUserId;

/// Port for DRM video OTP issuance.
#[async_trait]
pub trait VideoAccessProvider: Send + Sync {
    /// Issue a one-time playback credential for `video_id`, watermarked for `viewer`.
    async fn issue_otp(
        &self,
        video_id: &str,
        viewer: &ExternalUserId,
    ) -> Result<VideoOtp, VideoError>;
}

/// Playback credential handed to the client-side player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoOtp {
    pub otp: String,
    pub playback_info: String,
}

/// Video provider failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VideoError {
    #[error("Video not found: {0}")]
    NotFound(String),

    #[error("Video provider error: {0}")]
    Provider(String),

    #[error("Video provider timed out")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_access_provider_is_object_safe() {
        fn _accepts_dyn(_provider: &dyn VideoAccessProvider) {}
    }

    #[test]
    fn video_otp_serializes_camel_case() {
        let otp = VideoOtp {
            otp: "abc".to_string(),
            playback_info: "xyz".to_string(),
        };
        let json = serde_json::to_value(&otp).unwrap();
        assert_eq!(json["otp"], "abc");
        assert_eq!(json["playbackInfo"], "xyz");
    }
}
