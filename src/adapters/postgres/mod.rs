//! PostgreSQL adapters - Database implementations for store ports.
//!
//! - `PostgresUserRecordStore` - Subscriber records with version compare-and-set
//! - `PostgresProcessedWebhookStore` - Webhook deduplication ledger

mod processed_webhook_store;
mod user_record_store;

pub use processed_webhook_store::PostgresProcessedWebhookStore;
pub use user_record_store::PostgresUserRecordStore;

use sqlx::PgPool;

use crate::domain::foundation::DomainError;

/// Applies the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DomainError> {
    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DomainError::database(format!("Migration failed: {}", e)))?;
    tracing::info!("Database migrations completed");
    Ok(())
}
