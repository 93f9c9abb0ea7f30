//! ProcessedWebhookStore port - Interface for tracking handled payment webhooks.
//!
//! The gateway delivers at-least-once. A duplicate delivery must be
//! acknowledged without running the transition (and its notifications)
//! a second time, so every handled event id is remembered here.
//!
//! ## When duplicates happen
//!
//! - Network timeouts while we acknowledge
//! - 5xx responses from our endpoint (triggers retry)
//! - Our endpoint returning success but the gateway not receiving it

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, Timestamp};

/// How a handled event ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event changed state or scheduled notifications.
    Applied,
    /// The event was acknowledged without any effect.
    Ignored,
}

impl WebhookOutcome {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Applied => "applied",
            WebhookOutcome::Ignored => "ignored",
        }
    }

    /// Parses the storage representation.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "applied" => Some(WebhookOutcome::Applied),
            "ignored" => Some(WebhookOutcome::Ignored),
            _ => None,
        }
    }
}

/// Record of a handled webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedWebhookRecord {
    /// Gateway event ID (evt_xxx format).
    pub event_id: String,

    /// Gateway event type (e.g., "checkout.session.completed").
    pub event_type: String,

    /// When the event was handled.
    pub processed_at: Timestamp,

    pub outcome: WebhookOutcome,

    /// Why the event was ignored, when it was.
    pub detail: Option<String>,
}

impl ProcessedWebhookRecord {
    /// Creates a record for an event that was applied.
    pub fn applied(event_id: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Timestamp::now(),
            outcome: WebhookOutcome::Applied,
            detail: None,
        }
    }

    /// Creates a record for an event that was ignored.
    pub fn ignored(
        event_id: impl Into<String>,
        event_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type: event_type.into(),
            processed_at: Timestamp::now(),
            outcome: WebhookOutcome::Ignored,
            detail: Some(reason.into()),
        }
    }
}

/// Result of attempting to save a webhook record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was inserted (first time seeing this event).
    Inserted,
    /// Record already exists (duplicate event).
    AlreadyExists,
}

/// Port for storing and retrieving handled webhook events.
///
/// Implementations should rely on a uniqueness constraint on `event_id`
/// to stay correct under concurrent deliveries.
#[async_trait]
pub trait ProcessedWebhookStore: Send + Sync {
    /// Find a previously handled event by its gateway event ID.
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<ProcessedWebhookRecord>, DomainError>;

    /// Attempt to save a record.
    ///
    /// Returns `SaveResult::AlreadyExists` if another delivery got there first.
    async fn save(&self, record: ProcessedWebhookRecord) -> Result<SaveResult, DomainError>;

    /// Delete records handled before `cutoff`. Returns the number deleted.
    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_webhook_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn ProcessedWebhookStore) {}
    }

    #[test]
    fn applied_record_has_no_detail() {
        let record = ProcessedWebhookRecord::applied("evt_123", "checkout.session.completed");

        assert_eq!(record.event_id, "evt_123");
        assert_eq!(record.outcome, WebhookOutcome::Applied);
        assert!(record.detail.is_none());
    }

    #[test]
    fn ignored_record_includes_reason() {
        let record = ProcessedWebhookRecord::ignored("evt_456", "invoice.paid", "not handled");

        assert_eq!(record.outcome, WebhookOutcome::Ignored);
        assert_eq!(record.detail.as_deref(), Some("not handled"));
    }

    #[test]
    fn outcome_storage_form_parses_back() {
        for outcome in [WebhookOutcome::Applied, WebhookOutcome::Ignored] {
            assert_eq!(WebhookOutcome::parse(outcome.as_str()), Some(outcome));
        }
        assert_eq!(WebhookOutcome::parse("failed"), None);
    }
}
