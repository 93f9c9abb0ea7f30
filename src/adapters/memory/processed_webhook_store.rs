//! In-memory implementation of `ProcessedWebhookStore`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{ProcessedWebhookRecord, ProcessedWebhookStore, SaveResult};

/// Handled webhook ids held in a process-local map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProcessedWebhookStore {
    records: Arc<RwLock<HashMap<String, ProcessedWebhookRecord>>>,
}

impl InMemoryProcessedWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ProcessedWebhookStore for InMemoryProcessedWebhookStore {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<ProcessedWebhookRecord>, DomainError> {
        Ok(self.records.read().await.get(event_id).cloned())
    }

    async fn save(&self, record: ProcessedWebhookRecord) -> Result<SaveResult, DomainError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.event_id) {
            return Ok(SaveResult::AlreadyExists);
        }
        records.insert(record.event_id.clone(), record);
        Ok(SaveResult::Inserted)
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| !r.processed_at.is_before(&cutoff));
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::WebhookOutcome;

    #[tokio::test]
    async fn save_is_idempotent_per_event_id() {
        let store = InMemoryProcessedWebhookStore::new();

        let first = store
            .save(ProcessedWebhookRecord::applied("evt_1", "checkout.session.completed"))
            .await
            .unwrap();
        let second = store
            .save(ProcessedWebhookRecord::ignored("evt_1", "checkout.session.completed", "dup"))
            .await
            .unwrap();

        assert_eq!(first, SaveResult::Inserted);
        assert_eq!(second, SaveResult::AlreadyExists);

        let stored = store.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert_eq!(stored.outcome, WebhookOutcome::Applied);
    }

    #[tokio::test]
    async fn delete_before_removes_only_old_records() {
        let store = InMemoryProcessedWebhookStore::new();

        let mut old = ProcessedWebhookRecord::applied("evt_old", "invoice.payment_failed");
        old.processed_at = Timestamp::now().plus_days(-10);
        store.save(old).await.unwrap();
        store
            .save(ProcessedWebhookRecord::applied("evt_new", "invoice.payment_failed"))
            .await
            .unwrap();

        let deleted = store
            .delete_before(Timestamp::now().plus_days(-7))
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert!(store.find_by_event_id("evt_old").await.unwrap().is_none());
        assert!(store.find_by_event_id("evt_new").await.unwrap().is_some());
    }
}
