//! In-memory store adapters.
//!
//! Used when no database is configured, and throughout the tests.

mod processed_webhook_store;
mod user_record_store;

pub use processed_webhook_store::InMemoryProcessedWebhookStore;
pub use user_record_store::InMemoryUserRecordStore;
