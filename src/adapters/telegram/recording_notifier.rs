//! Notifier that records calls instead of talking to a chat platform.
//!
//! Used by tests and by local runs without a bot token. Individual
//! operations can be told to fail or to stall.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::foundation::ExternalUserId;
use crate::ports::{AccessNotifier, NotifierError};

/// One recorded notifier call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    Message { user: ExternalUserId, text: String },
    Grant { user: ExternalUserId },
    Revoke { user: ExternalUserId },
}

#[derive(Default)]
struct RecordingState {
    calls: Vec<NotifierCall>,
    fail_messages: bool,
    fail_grants: bool,
    fail_revokes: bool,
    delay: Option<Duration>,
}

/// In-process `AccessNotifier` with a call log.
#[derive(Clone, Default)]
pub struct RecordingAccessNotifier {
    inner: Arc<Mutex<RecordingState>>,
}

impl RecordingAccessNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RecordingState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_messages(&self, fail: bool) {
        self.state().fail_messages = fail;
    }

    pub fn fail_grants(&self, fail: bool) {
        self.state().fail_grants = fail;
    }

    pub fn fail_revokes(&self, fail: bool) {
        self.state().fail_revokes = fail;
    }

    /// Stall every call by `delay` before it completes.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<NotifierCall> {
        self.state().calls.clone()
    }

    /// Texts of every message sent to `user`, in order.
    pub fn messages_to(&self, user: &ExternalUserId) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map(|call| match call {
                NotifierCall::Message { user: u, text } if u == user => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn revocations(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, NotifierCall::Revoke { .. }))
            .count()
    }

    pub fn grants(&self) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|c| matches!(c, NotifierCall::Grant { .. }))
            .count()
    }

    async fn stall(&self) {
        let delay = self.state().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl AccessNotifier for RecordingAccessNotifier {
    async fn send_message(&self, user: &ExternalUserId, text: &str) -> Result<(), NotifierError> {
        self.stall().await;
        let mut state = self.state();
        if state.fail_messages {
            return Err(NotifierError::Platform("Forbidden: bot was blocked by the user".to_string()));
        }
        state.calls.push(NotifierCall::Message {
            user: user.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn grant_group_access(&self, user: &ExternalUserId) -> Result<String, NotifierError> {
        self.stall().await;
        let mut state = self.state();
        if state.fail_grants {
            return Err(NotifierError::Platform("Bad Request: not enough rights".to_string()));
        }
        state.calls.push(NotifierCall::Grant { user: user.clone() });
        Ok(format!("https://t.me/+invite-{}", user))
    }

    async fn revoke_group_access(&self, user: &ExternalUserId) -> Result<(), NotifierError> {
        self.stall().await;
        let mut state = self.state();
        if state.fail_revokes {
            return Err(NotifierError::Platform("Bad Request: not enough rights".to_string()));
        }
        state.calls.push(NotifierCall::Revoke { user: user.clone() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_successful_calls() {
        let notifier = RecordingAccessNotifier::new();
        let user = ExternalUserId::from_numeric(7);

        notifier.send_message(&user, "hello").await.unwrap();
        let link = notifier.grant_group_access(&user).await.unwrap();
        notifier.revoke_group_access(&user).await.unwrap();

        assert!(link.contains("invite"));
        assert_eq!(notifier.messages_to(&user), vec!["hello".to_string()]);
        assert_eq!(notifier.grants(), 1);
        assert_eq!(notifier.revocations(), 1);
    }

    #[tokio::test]
    async fn failing_operation_is_not_recorded() {
        let notifier = RecordingAccessNotifier::new();
        notifier.fail_revokes(true);
        let user = ExternalUserId::from_numeric(7);

        assert!(notifier.revoke_group_access(&user).await.is_err());
        assert_eq!(notifier.revocations(), 0);

        notifier.send_message(&user, "still works").await.unwrap();
        assert_eq!(notifier.calls().len(), 1);
    }
}
