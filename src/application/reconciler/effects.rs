//! Side-effect execution.
//!
//! Effects run after the state change they belong to has been saved. Each
//! one is its own task with its own timeouts; a failure is logged and
//! never propagated.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::domain::foundation::ExternalUserId;
use crate::domain::subscriber::SideEffect;
use crate::ports::{AccessNotifier, NotifierError};

/// User-facing texts for side effects.
pub mod messages {
    use crate::domain::foundation::Timestamp;

    pub fn welcome(period_end: Timestamp, invite_link: Option<&str>) -> String {
        match invite_link {
            Some(link) => format!(
                "Payment received, welcome aboard! Your subscription is active until {}.\n\nJoin the private group here: {}",
                period_end.to_date_string(),
                link
            ),
            None => format!(
                "Payment received, welcome aboard! Your subscription is active until {}.\n\nWe could not create your group invite just now. Please contact an admin to be added.",
                period_end.to_date_string()
            ),
        }
    }

    pub fn renewal(period_end: Timestamp) -> String {
        format!(
            "Your subscription has been renewed. Access continues until {}.",
            period_end.to_date_string()
        )
    }

    pub fn payment_failed() -> String {
        "We could not charge your card for the latest renewal. Send /start and use \"Manage subscription\" to update your payment method before access ends.".to_string()
    }

    pub fn cancelled() -> String {
        "Your subscription has ended and you have been removed from the private group. Send /start whenever you want to subscribe again.".to_string()
    }
}

/// Handle to effect tasks spawned for one event.
///
/// Dropping it detaches the tasks; `join` waits for all of them.
#[derive(Debug, Default)]
pub struct PendingEffects {
    handles: Vec<JoinHandle<()>>,
}

impl PendingEffects {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait until every effect task has finished.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Side-effect task did not complete");
            }
        }
    }
}

/// Spawns and runs side effects against the access notifier.
#[derive(Clone)]
pub struct EffectRunner {
    notifier: Arc<dyn AccessNotifier>,
    timeout: Duration,
}

impl EffectRunner {
    pub fn new(notifier: Arc<dyn AccessNotifier>, timeout: Duration) -> Self {
        Self { notifier, timeout }
    }

    /// Spawn one task per effect.
    pub fn spawn_all(&self, effects: Vec<SideEffect>) -> PendingEffects {
        let handles = effects
            .into_iter()
            .map(|effect| {
                let runner = self.clone();
                tokio::spawn(async move { runner.run(effect).await })
            })
            .collect();
        PendingEffects { handles }
    }

    async fn run(&self, effect: SideEffect) {
        let user = effect.external_user_id().clone();
        match self.execute(&effect).await {
            Ok(()) => tracing::debug!(
                effect = effect.name(),
                external_user_id = %user,
                "Side effect delivered"
            ),
            Err(e) => tracing::warn!(
                effect = effect.name(),
                external_user_id = %user,
                error = %e,
                "Notification failure"
            ),
        }
    }

    async fn execute(&self, effect: &SideEffect) -> Result<(), NotifierError> {
        match effect {
            SideEffect::GrantAccess {
                external_user_id,
                period_end,
            } => {
                let link = match self
                    .bounded("grant_group_access", self.notifier.grant_group_access(external_user_id))
                    .await
                {
                    Ok(link) => Some(link),
                    Err(e) => {
                        tracing::warn!(
                            external_user_id = %external_user_id,
                            error = %e,
                            "Invite link unavailable, sending welcome without it"
                        );
                        None
                    }
                };
                self.send(external_user_id, messages::welcome(*period_end, link.as_deref()))
                    .await
            }

            SideEffect::ConfirmRenewal {
                external_user_id,
                period_end,
            } => {
                self.send(external_user_id, messages::renewal(*period_end))
                    .await
            }

            SideEffect::WarnPaymentFailed { external_user_id } => {
                self.send(external_user_id, messages::payment_failed()).await
            }

            SideEffect::RevokeAccess { external_user_id } => {
                self.bounded(
                    "revoke_group_access",
                    self.notifier.revoke_group_access(external_user_id),
                )
                .await
            }

            SideEffect::NotifyCancelled { external_user_id } => {
                self.send(external_user_id, messages::cancelled()).await
            }
        }
    }

    async fn send(&self, user: &ExternalUserId, text: String) -> Result<(), NotifierError> {
        self.bounded("send_message", self.notifier.send_message(user, &text))
            .await
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, NotifierError>>,
    ) -> Result<T, NotifierError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| NotifierError::Timeout(operation))?
    }
}
