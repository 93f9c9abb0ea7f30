//! PostgreSQL implementation of UserRecordStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::foundation::{
    DomainError, ErrorCode, ExternalUserId, PaymentCustomerId, Timestamp,
};
use crate::domain::subscriber::{SubscriberRecord, SubscriptionStatus};
use crate::ports::UserRecordStore;

const SELECT_COLUMNS: &str = r#"
    SELECT external_user_id, display_name, username, payment_customer_id, status,
           period_end, subscription_id, last_event_at, created_at, updated_at, version
    FROM subscribers
"#;

/// PostgreSQL implementation of the UserRecordStore port.
pub struct PostgresUserRecordStore {
    pool: PgPool,
}

impl PostgresUserRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a subscriber.
#[derive(Debug, sqlx::FromRow)]
struct SubscriberRow {
    external_user_id: String,
    display_name: String,
    username: Option<String>,
    payment_customer_id: String,
    status: String,
    period_end: Option<DateTime<Utc>>,
    subscription_id: Option<String>,
    last_event_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<SubscriberRow> for SubscriberRecord {
    type Error = DomainError;

    fn try_from(row: SubscriberRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, e: &dyn std::fmt::Display| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid {}: {}", field, e),
            )
        };

        Ok(SubscriberRecord {
            external_user_id: ExternalUserId::new(row.external_user_id)
                .map_err(|e| corrupt("external_user_id", &e))?,
            display_name: row.display_name,
            username: row.username,
            payment_customer_id: PaymentCustomerId::new(row.payment_customer_id)
                .map_err(|e| corrupt("payment_customer_id", &e))?,
            status: row
                .status
                .parse::<SubscriptionStatus>()
                .map_err(|e| corrupt("status", &e))?,
            period_end: row.period_end.map(Timestamp::from_datetime),
            subscription_id: row.subscription_id,
            last_event_at: row.last_event_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            version: row.version,
        })
    }
}

fn db_error(operation: &str, e: sqlx::Error) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Failed to {}: {}", operation, e),
    )
}

#[async_trait]
impl UserRecordStore for PostgresUserRecordStore {
    async fn find(&self, id: &ExternalUserId) -> Result<Option<SubscriberRecord>, DomainError> {
        let query = format!("{} WHERE external_user_id = $1", SELECT_COLUMNS);
        let row: Option<SubscriberRow> = sqlx::query_as(&query)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find subscriber", e))?;

        row.map(SubscriberRecord::try_from).transpose()
    }

    async fn find_by_customer_id(
        &self,
        customer_id: &PaymentCustomerId,
    ) -> Result<Option<SubscriberRecord>, DomainError> {
        let query = format!("{} WHERE payment_customer_id = $1", SELECT_COLUMNS);
        let row: Option<SubscriberRow> = sqlx::query_as(&query)
            .bind(customer_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("find subscriber by customer", e))?;

        row.map(SubscriberRecord::try_from).transpose()
    }

    async fn insert(&self, record: &SubscriberRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscribers (
                external_user_id, display_name, username, payment_customer_id, status,
                period_end, subscription_id, last_event_at, created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.external_user_id.as_str())
        .bind(&record.display_name)
        .bind(&record.username)
        .bind(record.payment_customer_id.as_str())
        .bind(record.status.as_str())
        .bind(record.period_end.map(|t| *t.as_datetime()))
        .bind(&record.subscription_id)
        .bind(record.last_event_at.map(|t| *t.as_datetime()))
        .bind(record.created_at.as_datetime())
        .bind(record.updated_at.as_datetime())
        .bind(record.version)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return DomainError::new(
                        ErrorCode::SubscriberExists,
                        format!("Subscriber {} already exists", record.external_user_id),
                    );
                }
            }
            db_error("insert subscriber", e)
        })?;

        Ok(())
    }

    async fn update(&self, record: &SubscriberRecord) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscribers SET
                display_name = $2,
                username = $3,
                payment_customer_id = $4,
                status = $5,
                period_end = $6,
                subscription_id = $7,
                last_event_at = $8,
                updated_at = $9,
                version = version + 1
            WHERE external_user_id = $1 AND version = $10
            "#,
        )
        .bind(record.external_user_id.as_str())
        .bind(&record.display_name)
        .bind(&record.username)
        .bind(record.payment_customer_id.as_str())
        .bind(record.status.as_str())
        .bind(record.period_end.map(|t| *t.as_datetime()))
        .bind(&record.subscription_id)
        .bind(record.last_event_at.map(|t| *t.as_datetime()))
        .bind(record.updated_at.as_datetime())
        .bind(record.version)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("update subscriber", e))?;

        if result.rows_affected() == 0 {
            let exists: Option<(i64,)> =
                sqlx::query_as("SELECT version FROM subscribers WHERE external_user_id = $1")
                    .bind(record.external_user_id.as_str())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| db_error("check subscriber version", e))?;

            return Err(match exists {
                Some((found,)) => DomainError::new(
                    ErrorCode::ConcurrentModification,
                    format!(
                        "Subscriber {} changed concurrently (expected version {}, found {})",
                        record.external_user_id, record.version, found
                    ),
                ),
                None => DomainError::new(
                    ErrorCode::SubscriberNotFound,
                    format!("Subscriber {} not found", record.external_user_id),
                ),
            });
        }

        Ok(())
    }
}
