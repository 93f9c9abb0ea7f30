//! VerifyVideoAccessHandler - Query handler gating DRM video playback on entitlement.

use std::sync::Arc;
use std::time::Duration;

use crate::application::reconciler::{ReconcileError, SubscriptionReconciler};
use crate::domain::foundation::ExternalUserId;
use crate::ports::{VideoAccessProvider, VideoOtp};

/// Query to obtain a playback credential.
#[derive(Debug, Clone)]
pub struct VerifyVideoAccessQuery {
    pub video_id: String,
    pub user_id: String,
}

/// Why playback was refused. `message` is shown to the user verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoAccessDenial {
    UserNotFound,
    SubscriptionRequired,
    ServiceUnavailable,
}

impl VideoAccessDenial {
    pub fn message(&self) -> &'static str {
        match self {
            VideoAccessDenial::UserNotFound => "User not found",
            VideoAccessDenial::SubscriptionRequired => "Active subscription required",
            VideoAccessDenial::ServiceUnavailable => "Video service unavailable",
        }
    }
}

/// Result of a video access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyVideoAccessResult {
    Granted(VideoOtp),
    Denied(VideoAccessDenial),
}

pub struct VerifyVideoAccessHandler {
    reconciler: Arc<SubscriptionReconciler>,
    videos: Arc<dyn VideoAccessProvider>,
    timeout: Duration,
}

impl VerifyVideoAccessHandler {
    pub fn new(
        reconciler: Arc<SubscriptionReconciler>,
        videos: Arc<dyn VideoAccessProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            reconciler,
            videos,
            timeout,
        }
    }

    pub async fn handle(&self, query: VerifyVideoAccessQuery) -> VerifyVideoAccessResult {
        let Ok(user) = ExternalUserId::new(query.user_id) else {
            return VerifyVideoAccessResult::Denied(VideoAccessDenial::UserNotFound);
        };

        let record = match self.reconciler.current_status(&user).await {
            Ok(record) => record,
            Err(ReconcileError::NotFound(_)) => {
                return VerifyVideoAccessResult::Denied(VideoAccessDenial::UserNotFound)
            }
            Err(e) => {
                tracing::error!(external_user_id = %user, error = %e, "Subscriber lookup failed");
                return VerifyVideoAccessResult::Denied(VideoAccessDenial::ServiceUnavailable);
            }
        };

        if !record.is_entitled() {
            tracing::info!(external_user_id = %user, status = %record.status, "Video access refused");
            return VerifyVideoAccessResult::Denied(VideoAccessDenial::SubscriptionRequired);
        }

        match tokio::time::timeout(self.timeout, self.videos.issue_otp(&query.video_id, &user)).await
        {
            Ok(Ok(otp)) => {
                tracing::debug!(external_user_id = %user, video_id = %query.video_id, "Video OTP issued");
                VerifyVideoAccessResult::Granted(otp)
            }
            Ok(Err(e)) => {
                tracing::warn!(video_id = %query.video_id, error = %e, "Video provider failed");
                VerifyVideoAccessResult::Denied(VideoAccessDenial::ServiceUnavailable)
            }
            Err(_) => {
                tracing::warn!(video_id = %query.video_id, "Video provider timed out");
                VerifyVideoAccessResult::Denied(VideoAccessDenial::ServiceUnavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryUserRecordStore;
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::adapters::telegram::RecordingAccessNotifier;
    use crate::adapters::video::StaticVideoProvider;
    use crate::application::reconciler::ReconcilerTimeouts;
    use crate::domain::foundation::Timestamp;
    use crate::domain::subscriber::{LifecycleEvent, LifecycleEventKind};

    struct Fixture {
        handler: VerifyVideoAccessHandler,
        reconciler: Arc<SubscriptionReconciler>,
        gateway: MockPaymentGateway,
        videos: StaticVideoProvider,
    }

    fn fixture() -> Fixture {
        let gateway = MockPaymentGateway::new();
        let videos = StaticVideoProvider::new();
        let reconciler = Arc::new(SubscriptionReconciler::new(
            Arc::new(InMemoryUserRecordStore::new()),
            Arc::new(gateway.clone()),
            Arc::new(RecordingAccessNotifier::new()),
            ReconcilerTimeouts::default(),
        ));
        let handler = VerifyVideoAccessHandler::new(
            Arc::clone(&reconciler),
            Arc::new(videos.clone()),
            Duration::from_secs(1),
        );
        Fixture {
            handler,
            reconciler,
            gateway,
            videos,
        }
    }

    fn query(user: &str) -> VerifyVideoAccessQuery {
        VerifyVideoAccessQuery {
            video_id: "vid_1".to_string(),
            user_id: user.to_string(),
        }
    }

    async fn activate(f: &Fixture, user: &ExternalUserId) {
        let record = f.reconciler.ensure_user(user, None, "Ada").await.unwrap();
        f.gateway.add_subscription(
            "sub_1",
            record.payment_customer_id.as_str(),
            Timestamp::now().plus_days(30),
        );
        f.reconciler
            .apply_event(&LifecycleEvent {
                event_id: "evt_1".to_string(),
                occurred_at: Timestamp::now(),
                kind: LifecycleEventKind::CheckoutCompleted {
                    external_user_id: Some(user.clone()),
                    customer_id: None,
                    subscription_id: "sub_1".to_string(),
                },
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let f = fixture();
        assert_eq!(
            f.handler.handle(query("404")).await,
            VerifyVideoAccessResult::Denied(VideoAccessDenial::UserNotFound)
        );
    }

    #[tokio::test]
    async fn inactive_user_needs_subscription() {
        let f = fixture();
        let user = ExternalUserId::from_numeric(5);
        f.reconciler.ensure_user(&user, None, "Ada").await.unwrap();

        assert_eq!(
            f.handler.handle(query("5")).await,
            VerifyVideoAccessResult::Denied(VideoAccessDenial::SubscriptionRequired)
        );
        assert_eq!(f.videos.issued(), 0);
    }

    #[tokio::test]
    async fn active_user_gets_otp() {
        let f = fixture();
        let user = ExternalUserId::from_numeric(5);
        activate(&f, &user).await;

        match f.handler.handle(query("5")).await {
            VerifyVideoAccessResult::Granted(otp) => assert!(!otp.otp.is_empty()),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn provider_failure_is_service_unavailable() {
        let f = fixture();
        let user = ExternalUserId::from_numeric(5);
        activate(&f, &user).await;
        f.videos.fail(true);

        assert_eq!(
            f.handler.handle(query("5")).await,
            VerifyVideoAccessResult::Denied(VideoAccessDenial::ServiceUnavailable)
        );
    }

    #[test]
    fn denial_messages_are_user_facing() {
        assert_eq!(VideoAccessDenial::UserNotFound.message(), "User not found");
        assert_eq!(
            VideoAccessDenial::SubscriptionRequired.message(),
            "Active subscription required"
        );
        assert_eq!(
            VideoAccessDenial::ServiceUnavailable.message(),
            "Video service unavailable"
        );
    }
}
