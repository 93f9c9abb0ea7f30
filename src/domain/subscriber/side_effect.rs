//! Side effects scheduled after a durable state change.

use crate::domain::foundation::{ExternalUserId, Timestamp};

/// A best-effort notification or group-membership change.
///
/// Each effect runs independently; failure of one never blocks another and
/// never rolls back the state change that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    /// Send the group invite link with a welcome message.
    GrantAccess {
        external_user_id: ExternalUserId,
        period_end: Timestamp,
    },

    /// Confirm that the subscription was extended.
    ConfirmRenewal {
        external_user_id: ExternalUserId,
        period_end: Timestamp,
    },

    /// Warn that a renewal charge failed.
    WarnPaymentFailed { external_user_id: ExternalUserId },

    /// Remove the user from the private group.
    RevokeAccess { external_user_id: ExternalUserId },

    /// Tell the user the subscription ended.
    NotifyCancelled { external_user_id: ExternalUserId },
}

impl SideEffect {
    /// The user this effect targets.
    pub fn external_user_id(&self) -> &ExternalUserId {
        match self {
            SideEffect::GrantAccess {
                external_user_id, ..
            }
            | SideEffect::ConfirmRenewal {
                external_user_id, ..
            }
            | SideEffect::WarnPaymentFailed { external_user_id }
            | SideEffect::RevokeAccess { external_user_id }
            | SideEffect::NotifyCancelled { external_user_id } => external_user_id,
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            SideEffect::GrantAccess { .. } => "grant_access",
            SideEffect::ConfirmRenewal { .. } => "confirm_renewal",
            SideEffect::WarnPaymentFailed { .. } => "warn_payment_failed",
            SideEffect::RevokeAccess { .. } => "revoke_access",
            SideEffect::NotifyCancelled { .. } => "notify_cancelled",
        }
    }
}
