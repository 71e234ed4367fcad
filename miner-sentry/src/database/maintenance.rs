//! Database maintenance operations.
//!
//! This module provides the daily retention sweep:
//! - Reading retention cleanup
//! - Incremental vacuum
//! - WAL checkpoint

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::Result;
use crate::database::DbPool;
use crate::database::repositories::TelemetryRepository;
use crate::database::time::retention_cutoff;

/// Outcome of one retention sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanupReport {
    /// Readings older than this instant were removed.
    pub cutoff: DateTime<Utc>,
    /// Number of readings removed.
    pub deleted: u64,
}

/// Deletes readings that fell out of the retention window.
pub struct RetentionSweeper {
    repo: Arc<dyn TelemetryRepository>,
    /// Present when the sweep should also compact the database file.
    pool: Option<DbPool>,
}

impl RetentionSweeper {
    /// Create a sweeper that only deletes rows.
    pub fn new(repo: Arc<dyn TelemetryRepository>) -> Self {
        Self { repo, pool: None }
    }

    /// Also run an incremental vacuum and WAL checkpoint after deleting.
    pub fn with_pool(mut self, pool: DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Delete readings older than `retention_days` relative to `now`.
    pub async fn sweep(&self, retention_days: u32, now: DateTime<Utc>) -> Result<CleanupReport> {
        let start = Instant::now();
        let cutoff = retention_cutoff(now, retention_days);
        let deleted = self.repo.delete_older_than(cutoff).await?;

        tracing::info!(
            "Cleaned {} readings older than {} days (cutoff {})",
            deleted,
            retention_days,
            cutoff.to_rfc3339()
        );

        if deleted > 0
            && let Some(pool) = &self.pool
        {
            // Compaction is best-effort; the deletion above is already committed.
            if let Err(e) = compact(pool).await {
                tracing::warn!("Database compaction after cleanup failed: {}", e);
            }
        }

        tracing::debug!("Retention sweep finished in {:?}", start.elapsed());
        Ok(CleanupReport { cutoff, deleted })
    }
}

async fn compact(pool: &DbPool) -> Result<()> {
    sqlx::query("PRAGMA incremental_vacuum").execute(pool).await?;

    let row: (i32, i32, i32) = sqlx::query_as("PRAGMA wal_checkpoint(PASSIVE)")
        .fetch_one(pool)
        .await?;
    tracing::debug!(
        "WAL checkpoint: busy={}, checkpointed={}, total={}",
        row.0,
        row.1,
        row.2
    );
    Ok(())
}
