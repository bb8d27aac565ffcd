use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, Result, Version,
    store::{EventStore, validate_events_for_append, verify_stream},
    unit_of_work::{TransactionManager, UnitOfWork},
};

const UNIQUE_AGGREGATE_VERSION: &str = "unique_aggregate_version";

/// PostgreSQL-backed event store implementation.
///
/// Conflicting appends are serialized by the `(aggregate_id, version)`
/// unique constraint; a violation is reported as `ConcurrencyConflict`.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Returns a transaction manager whose units of work write through
    /// database transactions on this store's pool.
    pub fn transaction_manager(&self) -> PostgresTransactionManager {
        PostgresTransactionManager {
            pool: self.pool.clone(),
        }
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;
        let version: i64 = row.try_get("version")?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from(row.try_get::<String, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            // The table enforces version > 0.
            version: Version::new(version as u64),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }
}

/// Checks the head version and inserts a validated batch on `conn`.
async fn append_on(
    conn: &mut PgConnection,
    events: &[EventEnvelope],
    expected_base_version: Version,
) -> Result<Version> {
    validate_events_for_append(events, expected_base_version)?;
    let aggregate_id = &events[0].aggregate_id;

    let current: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
            .bind(aggregate_id.as_str())
            .fetch_one(&mut *conn)
            .await?;
    let actual = Version::new(current.unwrap_or(0) as u64);

    if actual != expected_base_version {
        metrics::counter!("event_store_conflicts_total").increment(1);
        return Err(EventStoreError::ConcurrencyConflict {
            aggregate_id: aggregate_id.clone(),
            expected: expected_base_version,
            actual,
        });
    }

    let mut last_version = expected_base_version;
    for event in events {
        let metadata_json = serde_json::to_value(&event.metadata)?;

        sqlx::query(
            r#"
            INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.event_id.as_uuid())
        .bind(&event.event_type)
        .bind(event.aggregate_id.as_str())
        .bind(&event.aggregate_type)
        .bind(event.version.as_u64() as i64)
        .bind(event.timestamp)
        .bind(&event.payload)
        .bind(metadata_json)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            // A concurrent writer got the same version in first.
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(UNIQUE_AGGREGATE_VERSION)
            {
                metrics::counter!("event_store_conflicts_total").increment(1);
                return EventStoreError::ConcurrencyConflict {
                    aggregate_id: aggregate_id.clone(),
                    expected: expected_base_version,
                    actual: event.version,
                };
            }
            EventStoreError::Database(e)
        })?;

        last_version = event.version;
    }

    Ok(last_version)
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn save(
        &self,
        events: Vec<EventEnvelope>,
        expected_base_version: Version,
    ) -> Result<Version> {
        let mut tx = self.pool.begin().await?;
        let version = append_on(&mut tx, &events, expected_base_version).await?;
        tx.commit().await?;
        Ok(version)
    }

    async fn load(&self, aggregate_id: &AggregateId) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata
            FROM events
            WHERE aggregate_id = $1
            ORDER BY version ASC
            "#,
        )
        .bind(aggregate_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let events = rows
            .into_iter()
            .map(Self::row_to_event)
            .collect::<Result<Vec<_>>>()?;
        verify_stream(aggregate_id, &events)?;
        Ok(events)
    }

    async fn current_version(&self, aggregate_id: &AggregateId) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(version.map(|v| Version::new(v as u64)))
    }
}

/// Opens units of work backed by PostgreSQL transactions.
#[derive(Clone)]
pub struct PostgresTransactionManager {
    pool: PgPool,
}

#[async_trait]
impl TransactionManager for PostgresTransactionManager {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresUnitOfWork { tx }))
    }
}

struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn stage(
        &mut self,
        events: Vec<EventEnvelope>,
        expected_base_version: Version,
    ) -> Result<Version> {
        append_on(&mut self.tx, &events, expected_base_version).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
