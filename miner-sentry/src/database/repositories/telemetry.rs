//! Telemetry repository: miners and their readings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::database::models::{MinerDbModel, NewReading, ReadingDbModel};
use crate::database::retry::retry_on_sqlite_busy;
use crate::database::time::{datetime_to_ms, now_ms};
use crate::{Error, Result};

/// Telemetry repository trait.
///
/// Every write is committed atomically per call.
#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    // Miners
    /// Return the miner for `endpoint`, creating it with `name` on first sighting.
    async fn upsert_miner(&self, endpoint: &str, name: &str) -> Result<MinerDbModel>;
    async fn get_miner(&self, id: i64) -> Result<MinerDbModel>;
    async fn list_miners(&self) -> Result<Vec<MinerDbModel>>;
    /// Delete a miner together with all of its readings.
    async fn delete_miner(&self, id: i64) -> Result<()>;

    // Readings
    async fn insert_reading(&self, miner_id: i64, reading: &NewReading) -> Result<ReadingDbModel>;
    async fn latest_reading(&self, miner_id: i64) -> Result<Option<ReadingDbModel>>;
    /// Readings strictly newer than `cutoff`, oldest first.
    async fn readings_since(
        &self,
        cutoff: DateTime<Utc>,
        miner_id: Option<i64>,
    ) -> Result<Vec<ReadingDbModel>>;
    /// Delete readings strictly older than `cutoff`, returning the number removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

/// SQLx implementation of TelemetryRepository.
#[derive(Clone)]
pub struct SqlxTelemetryRepository {
    pool: SqlitePool,
}

impl SqlxTelemetryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn upsert_miner_once(&self, endpoint: &str, name: &str) -> Result<MinerDbModel> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO miner (name, endpoint, added_at)
            VALUES (?, ?, ?)
            ON CONFLICT(endpoint) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(endpoint)
        .bind(now_ms())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let miner =
            sqlx::query_as::<_, MinerDbModel>("SELECT * FROM miner WHERE endpoint = ?")
                .bind(endpoint)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        if inserted > 0 {
            tracing::info!(endpoint = %endpoint, miner_id = miner.id, "Registered new miner");
        }
        Ok(miner)
    }

    async fn insert_reading_once(
        &self,
        miner_id: i64,
        reading: &NewReading,
    ) -> Result<ReadingDbModel> {
        let result = sqlx::query(
            r#"
            INSERT INTO reading (
                miner_id, timestamp, hash_rate, temperature, best_diff, voltage,
                stratum_diff, shares_accepted, shares_rejected, current_stratum_url
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(miner_id)
        .bind(reading.timestamp)
        .bind(reading.hash_rate)
        .bind(reading.temperature)
        .bind(&reading.best_diff)
        .bind(reading.voltage)
        .bind(reading.stratum_diff)
        .bind(reading.shares_accepted)
        .bind(reading.shares_rejected)
        .bind(&reading.current_stratum_url)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(ReadingDbModel {
                id: done.last_insert_rowid(),
                miner_id,
                timestamp: reading.timestamp,
                hash_rate: reading.hash_rate,
                temperature: reading.temperature,
                best_diff: reading.best_diff.clone(),
                voltage: reading.voltage,
                stratum_diff: reading.stratum_diff,
                shares_accepted: reading.shares_accepted,
                shares_rejected: reading.shares_rejected,
                current_stratum_url: reading.current_stratum_url.clone(),
            }),
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                Err(Error::not_found("Miner", miner_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_miner_once(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // The FK cascades too; deleting explicitly keeps this correct on
        // connections opened without foreign_keys.
        let readings = sqlx::query("DELETE FROM reading WHERE miner_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let miners = sqlx::query("DELETE FROM miner WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if miners == 0 {
            tx.rollback().await?;
            return Err(Error::not_found("Miner", id));
        }

        tx.commit().await?;
        tracing::info!(miner_id = id, readings, "Deleted miner and its readings");
        Ok(())
    }
}

#[async_trait]
impl TelemetryRepository for SqlxTelemetryRepository {
    async fn upsert_miner(&self, endpoint: &str, name: &str) -> Result<MinerDbModel> {
        retry_on_sqlite_busy("upsert_miner", || self.upsert_miner_once(endpoint, name)).await
    }

    async fn get_miner(&self, id: i64) -> Result<MinerDbModel> {
        sqlx::query_as::<_, MinerDbModel>("SELECT * FROM miner WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Miner", id))
    }

    async fn list_miners(&self) -> Result<Vec<MinerDbModel>> {
        let miners = sqlx::query_as::<_, MinerDbModel>("SELECT * FROM miner ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(miners)
    }

    async fn delete_miner(&self, id: i64) -> Result<()> {
        retry_on_sqlite_busy("delete_miner", || self.delete_miner_once(id)).await
    }

    async fn insert_reading(&self, miner_id: i64, reading: &NewReading) -> Result<ReadingDbModel> {
        retry_on_sqlite_busy("insert_reading", || {
            self.insert_reading_once(miner_id, reading)
        })
        .await
    }

    async fn latest_reading(&self, miner_id: i64) -> Result<Option<ReadingDbModel>> {
        let reading = sqlx::query_as::<_, ReadingDbModel>(
            "SELECT * FROM reading WHERE miner_id = ? ORDER BY timestamp DESC, id DESC LIMIT 1",
        )
        .bind(miner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(reading)
    }

    async fn readings_since(
        &self,
        cutoff: DateTime<Utc>,
        miner_id: Option<i64>,
    ) -> Result<Vec<ReadingDbModel>> {
        let cutoff_ms = datetime_to_ms(cutoff);
        let readings = match miner_id {
            Some(miner_id) => {
                sqlx::query_as::<_, ReadingDbModel>(
                    r#"
                    SELECT * FROM reading
                    WHERE miner_id = ? AND timestamp > ?
                    ORDER BY timestamp ASC, id ASC
                    "#,
                )
                .bind(miner_id)
                .bind(cutoff_ms)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ReadingDbModel>(
                    "SELECT * FROM reading WHERE timestamp > ? ORDER BY timestamp ASC, id ASC",
                )
                .bind(cutoff_ms)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(readings)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let cutoff_ms = datetime_to_ms(cutoff);
        retry_on_sqlite_busy("delete_older_than", || async {
            let done = sqlx::query("DELETE FROM reading WHERE timestamp < ?")
                .bind(cutoff_ms)
                .execute(&self.pool)
                .await?;
            Ok::<_, Error>(done.rows_affected())
        })
        .await
    }
}
