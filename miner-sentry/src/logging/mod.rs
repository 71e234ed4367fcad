//! Logging setup: console plus daily-rolling files, with local timestamps.
//!
//! This module provides:
//! - An `EnvFilter` driven by `RUST_LOG`
//! - A non-blocking daily file appender per binary
//! - Log file retention cleanup (deletes logs older than 7 days)

use chrono::{Local, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::utils::fs;

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "miner_sentry=info,sqlx=warn,tower_http=info";

/// Log retention period in days.
const LOG_RETENTION_DAYS: i64 = 7;

/// Custom timer that uses the local timezone via chrono.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Where this process writes its log files.
#[derive(Debug, Clone)]
pub struct LogFiles {
    log_dir: PathBuf,
    file_prefix: String,
}

impl LogFiles {
    pub fn new(log_dir: impl Into<PathBuf>, file_prefix: impl Into<String>) -> Self {
        Self {
            log_dir: log_dir.into(),
            file_prefix: file_prefix.into(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Name of today's file, matching `tracing_appender::rolling::daily`.
    pub fn current_file_name(&self) -> String {
        format!("{}.{}", self.file_prefix, Local::now().format("%Y-%m-%d"))
    }

    /// Start the log retention cleanup task.
    ///
    /// Runs daily and deletes log files older than 7 days.
    pub fn start_retention_cleanup(self: &Arc<Self>, cancel_token: CancellationToken) {
        let files = self.clone();

        tokio::spawn(async move {
            let cleanup_interval = Duration::from_secs(24 * 60 * 60);

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Log retention cleanup task shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(cleanup_interval) => {
                        if let Err(e) = cleanup_old_logs(&files.log_dir, &files.file_prefix, LOG_RETENTION_DAYS).await {
                            warn!(error = %e, "Failed to cleanup old logs");
                        }
                    }
                }
            }
        });
    }
}

/// Delete `<prefix>.YYYY-MM-DD` files dated more than `retention_days` ago.
async fn cleanup_old_logs(
    log_dir: &Path,
    file_prefix: &str,
    retention_days: i64,
) -> std::io::Result<usize> {
    let cutoff = (Utc::now() - chrono::Duration::days(retention_days)).date_naive();
    let prefix = format!("{file_prefix}.");

    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut deleted_count = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(date_str) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|name| name.strip_prefix(&prefix))
        else {
            continue;
        };

        let Ok(file_date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
            continue;
        };

        if file_date < cutoff {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to delete old log file");
            } else {
                deleted_count += 1;
                debug!(path = %path.display(), "Deleted old log file");
            }
        }
    }

    if deleted_count > 0 {
        info!(count = deleted_count, "Cleaned up old log files");
    }

    Ok(deleted_count)
}

/// Initialize the global subscriber.
///
/// # Arguments
/// * `log_dir` - Directory for log files
/// * `file_prefix` - Base name of the daily files, e.g. `miner-sentry.log`
///
/// # Returns
/// The log file description and a guard that must stay alive for the app lifetime.
pub fn init_logging(
    log_dir: &Path,
    file_prefix: &str,
) -> crate::Result<(Arc<LogFiles>, WorkerGuard)> {
    fs::ensure_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer)) // Console output with local time
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer),
        ) // File output with local time
        .try_init()
        .map_err(|e| {
            crate::Error::Other(format!("Failed to set global default subscriber: {}", e))
        })?;

    Ok((Arc::new(LogFiles::new(log_dir, file_prefix)), guard))
}
