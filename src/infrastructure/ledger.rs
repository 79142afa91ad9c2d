use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger backend is unreachable or erroring. Transient: the backend
    /// may come back, so callers classify this retryable.
    #[error("ledger storage error: {0}")]
    Storage(String),
}

/// Outcome of the conditional insert. A uniqueness conflict is a normal
/// "already processed" result, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Persisted set of message ids already fully processed.
///
/// Shared by every partition worker and, in a scaled-out deployment, by every
/// process instance. The uniqueness constraint on `message_id` is the only
/// mutual-exclusion mechanism required.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Fast-path pre-check only. Two delivery attempts for the same id can
    /// both see `false` here; only [`ProcessedEventStore::insert_if_absent`]
    /// is authoritative.
    async fn exists(&self, message_id: &str) -> Result<bool, LedgerError>;

    /// Atomic conditional insert keyed on `message_id`. The authoritative
    /// dedup gate.
    async fn insert_if_absent(
        &self,
        message_id: &str,
        message_key: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<InsertOutcome, LedgerError>;
}

pub struct PostgresProcessedEventStore {
    pool: PgPool,
}

impl PostgresProcessedEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(database_url)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;

        info!("Connected to processed-events ledger");
        Ok(Self::new(pool))
    }

    /// Creates the ledger table. Records are never updated or deleted; no
    /// retention policy is applied.
    pub async fn init_schema(&self) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS processed_events (
                message_id TEXT PRIMARY KEY,
                message_key TEXT NOT NULL,
                processed_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ProcessedEventStore for PostgresProcessedEventStore {
    async fn exists(&self, message_id: &str) -> Result<bool, LedgerError> {
        let row = sqlx::query("SELECT 1 FROM processed_events WHERE message_id = $1")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn insert_if_absent(
        &self,
        message_id: &str,
        message_key: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<InsertOutcome, LedgerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (message_id, message_key, processed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (message_id) DO NOTHING
            "#,
        )
        .bind(message_id)
        .bind(message_key)
        .bind(processed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(e.to_string()))?;

        if result.rows_affected() == 0 {
            Ok(InsertOutcome::AlreadyExists)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }
}
