//! Service container for dependency injection.
//!
//! Both binaries build one `ServiceContainer`: storage, settings, the shared
//! HTTP client and the notification service.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::Result;
use crate::alert::AlertTracker;
use crate::config::{ConfigService, ProcessConfig};
use crate::database::{self, DbPool, RetentionSweeper, SqlxTelemetryRepository, TelemetryRepository};
use crate::device::{DEFAULT_FETCH_TIMEOUT, DeviceClient, HttpDeviceClient};
use crate::notification::{NotificationService, NotificationSink};
use crate::poller::PollingEngine;
use crate::utils::{fs, http_client};

/// Service container holding all application services.
pub struct ServiceContainer {
    pub process: ProcessConfig,
    /// Database connection pool.
    pub pool: DbPool,
    pub repo: Arc<dyn TelemetryRepository>,
    pub config: Arc<ConfigService>,
    pub http_client: reqwest::Client,
    pub device_client: Arc<dyn DeviceClient>,
    pub notifications: Arc<NotificationService>,
    /// Cancellation token for graceful shutdown.
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Open storage (creating the schema) and load settings.
    pub async fn new(process: ProcessConfig) -> Result<Self> {
        info!("Initializing service container");

        fs::ensure_dir_all(&process.data_dir)?;
        let pool = database::init_pool(&process.database_url).await?;
        database::run_migrations(&pool).await?;

        let config = Arc::new(ConfigService::new(process.settings_store()));
        config.load();

        let http_client = http_client::build_client(DEFAULT_FETCH_TIMEOUT);
        let device_client: Arc<dyn DeviceClient> = Arc::new(HttpDeviceClient::with_client(
            http_client.clone(),
            DEFAULT_FETCH_TIMEOUT,
        ));
        let notifications = Arc::new(NotificationService::new(config.clone(), http_client.clone()));
        let repo: Arc<dyn TelemetryRepository> = Arc::new(SqlxTelemetryRepository::new(pool.clone()));

        info!("Service container initialized");

        Ok(Self {
            process,
            pool,
            repo,
            config,
            http_client,
            device_client,
            notifications,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Build a polling engine delivering alerts to `sink`.
    pub fn polling_engine(&self, sink: Arc<dyn NotificationSink>) -> PollingEngine {
        PollingEngine::new(
            self.repo.clone(),
            self.device_client.clone(),
            self.config.clone(),
            Arc::new(AlertTracker::new()),
            sink,
        )
    }

    /// Retention sweeper that also compacts the database file.
    pub fn retention_sweeper(&self) -> RetentionSweeper {
        RetentionSweeper::new(self.repo.clone()).with_pool(self.pool.clone())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Cancel background tasks and close the pool.
    pub async fn shutdown(&self) {
        self.cancellation_token.cancel();
        self.pool.close().await;
        let stats = self.notifications.stats();
        info!(
            sent = stats.sent,
            failed = stats.failed,
            skipped = stats.skipped,
            "Services shut down"
        );
    }
}
