//! PostgreSQL implementation of ProcessedWebhookStore.
//!
//! The primary key on `event_id` makes concurrent deliveries of the same
//! event race safely: `ON CONFLICT DO NOTHING` lets exactly one insert win.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::{ProcessedWebhookRecord, ProcessedWebhookStore, SaveResult, WebhookOutcome};

/// PostgreSQL implementation of the ProcessedWebhookStore port.
pub struct PostgresProcessedWebhookStore {
    pool: PgPool,
}

impl PostgresProcessedWebhookStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProcessedWebhookRow {
    event_id: String,
    event_type: String,
    processed_at: DateTime<Utc>,
    outcome: String,
    detail: Option<String>,
}

impl TryFrom<ProcessedWebhookRow> for ProcessedWebhookRecord {
    type Error = DomainError;

    fn try_from(row: ProcessedWebhookRow) -> Result<Self, Self::Error> {
        let outcome = WebhookOutcome::parse(&row.outcome).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid outcome value: {}", row.outcome),
            )
        })?;

        Ok(ProcessedWebhookRecord {
            event_id: row.event_id,
            event_type: row.event_type,
            processed_at: Timestamp::from_datetime(row.processed_at),
            outcome,
            detail: row.detail,
        })
    }
}

#[async_trait]
impl ProcessedWebhookStore for PostgresProcessedWebhookStore {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<ProcessedWebhookRecord>, DomainError> {
        let row: Option<ProcessedWebhookRow> = sqlx::query_as(
            r#"
            SELECT event_id, event_type, processed_at, outcome, detail
            FROM processed_webhook_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find webhook event: {}", e)))?;

        row.map(ProcessedWebhookRecord::try_from).transpose()
    }

    async fn save(&self, record: ProcessedWebhookRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_webhook_events (event_id, event_type, processed_at, outcome, detail)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(&record.event_id)
        .bind(&record.event_type)
        .bind(record.processed_at.as_datetime())
        .bind(record.outcome.as_str())
        .bind(&record.detail)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to save webhook event: {}", e)))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM processed_webhook_events WHERE processed_at < $1")
            .bind(cutoff.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::database(format!("Failed to purge webhook events: {}", e))
            })?;

        Ok(result.rows_affected())
    }
}
