//! Canned `VideoAccessProvider` for tests and local development.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::foundation::ExternalUserId;
use crate::ports::{VideoAccessProvider, VideoError, VideoOtp};

/// Issues deterministic OTPs without any network access.
#[derive(Debug, Clone, Default)]
pub struct StaticVideoProvider {
    failing: Arc<AtomicBool>,
    issued: Arc<AtomicUsize>,
}

impl StaticVideoProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail.
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of OTPs issued so far.
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoAccessProvider for StaticVideoProvider {
    async fn issue_otp(
        &self,
        video_id: &str,
        viewer: &ExternalUserId,
    ) -> Result<VideoOtp, VideoError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(VideoError::Provider("static provider set to fail".to_string()));
        }
        self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(VideoOtp {
            otp: format!("otp-{}-{}", video_id, viewer),
            playback_info: format!("playback-{}", video_id),
        })
    }
}
