//! User record store port.
//!
//! Keyed persistence for subscriber records. The reconciler is the only
//! writer; it needs unique-key lookup, reverse lookup by payment customer,
//! and single-record read-modify-write.
//!
//! # Concurrency
//!
//! `update` is a compare-and-set on `SubscriberRecord::version`. A store
//! must reject the write when the stored version differs from the one the
//! caller read, and bump the version on success.
//!
//! # Example
//!
//! ```ignore
//! async fn rename(
//!     store: &dyn UserRecordStore,
//!     id: &ExternalUserId,
//!     name: &str,
//! ) -> Result<(), DomainError> {
//!     let mut record = store
//!         .find(id)
//!         .await?
//!         .ok_or_else(|| DomainError::new(ErrorCode::SubscriberNotFound, "no such user"))?;
//!     record.display_name = name.to_string();
//!     store.update(&record).await
//! }
//! ```

use crate::domain::foundation::{DomainError, ExternalUserId, PaymentCustomerId};
use crate::domain::subscriber::SubscriberRecord;
use async_trait::async_trait;

/// Repository port for subscriber records.
#[async_trait]
pub trait UserRecordStore: Send + Sync {
    /// Find a subscriber by external user id.
    async fn find(&self, id: &ExternalUserId) -> Result<Option<SubscriberRecord>, DomainError>;

    /// Find a subscriber by payment customer id.
    async fn find_by_customer_id(
        &self,
        customer_id: &PaymentCustomerId,
    ) -> Result<Option<SubscriberRecord>, DomainError>;

    /// Insert a new subscriber.
    ///
    /// # Errors
    ///
    /// - `SubscriberExists` if the external user id is taken
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, record: &SubscriberRecord) -> Result<(), DomainError>;

    /// Update an existing subscriber if its version still matches.
    ///
    /// # Errors
    ///
    /// - `SubscriberNotFound` if the subscriber doesn't exist
    /// - `ConcurrentModification` if the stored version moved on
    /// - `DatabaseError` on persistence failure
    async fn update(&self, record: &SubscriberRecord) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_record_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn UserRecordStore) {}
    }
}
