//! In-memory implementation of `UserRecordStore`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, ExternalUserId, PaymentCustomerId};
use crate::domain::subscriber::SubscriberRecord;
use crate::ports::UserRecordStore;

/// Subscriber records held in a process-local map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserRecordStore {
    records: Arc<RwLock<HashMap<ExternalUserId, SubscriberRecord>>>,
}

impl InMemoryUserRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl UserRecordStore for InMemoryUserRecordStore {
    async fn find(&self, id: &ExternalUserId) -> Result<Option<SubscriberRecord>, DomainError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_by_customer_id(
        &self,
        customer_id: &PaymentCustomerId,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| &r.payment_customer_id == customer_id)
            .cloned())
    }

    async fn insert(&self, record: &SubscriberRecord) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.external_user_id) {
            return Err(DomainError::new(
                ErrorCode::SubscriberExists,
                format!("Subscriber {} already exists", record.external_user_id),
            ));
        }
        records.insert(record.external_user_id.clone(), record.clone());
        Ok(())
    }

    async fn update(&self, record: &SubscriberRecord) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        let stored = records.get_mut(&record.external_user_id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::SubscriberNotFound,
                format!("Subscriber {} not found", record.external_user_id),
            )
        })?;

        if stored.version != record.version {
            return Err(DomainError::new(
                ErrorCode::ConcurrentModification,
                format!(
                    "Subscriber {} changed concurrently (expected version {}, found {})",
                    record.external_user_id, record.version, stored.version
                ),
            ));
        }

        let mut next = record.clone();
        next.version += 1;
        *stored = next;
        Ok(())
    }
}
