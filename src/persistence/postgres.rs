//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::models::{EventRecord, SnapshotRecord};
use crate::config::ExchangeConfig;
use crate::error::ExchangeError;

/// PostgreSQL-backed persistence layer using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new persistence layer with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized by the configuration and runs the
    /// embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`ExchangeError::PersistenceError`] if the database is
    /// unreachable or a migration fails.
    pub async fn connect(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| ExchangeError::PersistenceError(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| ExchangeError::PersistenceError(e.to_string()))?;

        Ok(Self::new(pool))
    }

    /// Appends an event to the event log.
    ///
    /// # Errors
    ///
    /// Returns a [`ExchangeError::PersistenceError`] on database failure.
    pub async fn save_event(&self, record: &EventRecord) -> Result<i64, ExchangeError> {
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO events (batch_id, event_type, asset_ids, payload, occurred_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(record.batch_id)
        .bind(&record.event_type)
        .bind(&record.asset_ids)
        .bind(&record.payload)
        .bind(record.occurred_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ExchangeError::PersistenceError(e.to_string()))?;

        Ok(row)
    }

    /// Saves a pool state snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`ExchangeError::PersistenceError`] on database failure.
    pub async fn save_snapshot(&self, record: &SnapshotRecord) -> Result<i64, ExchangeError> {
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO pool_snapshots \
             (asset_id, currency_reserve, asset_reserve, total_shares, trade_count, currency_volume) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(&record.asset_id)
        .bind(&record.currency_reserve)
        .bind(&record.asset_reserve)
        .bind(&record.total_shares)
        .bind(record.trade_count)
        .bind(&record.currency_volume)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ExchangeError::PersistenceError(e.to_string()))?;

        Ok(row)
    }

    /// Deletes snapshots older than the given number of days.
    ///
    /// # Errors
    ///
    /// Returns a [`ExchangeError::PersistenceError`] on database failure.
    pub async fn delete_old_snapshots(&self, before_days: u64) -> Result<u64, ExchangeError> {
        let cutoff = i64::try_from(before_days)
            .ok()
            .and_then(TimeDelta::try_days)
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let result = sqlx::query("DELETE FROM pool_snapshots WHERE snapshot_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| ExchangeError::PersistenceError(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
