//! Daemon context: everything the polling daemon owns between start and exit.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::container::ServiceContainer;
use crate::Result;
use crate::notification::{NotificationEvent, NotificationSink};
use crate::poller::{PollSummary, PollingEngine};
use crate::reload::{self, PidMarker, ReloadSignal};
use crate::scheduler::{Scheduler, SchedulerHandle};

/// How long shutdown waits for background tasks.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// State owned by the daemon entry point and passed explicitly to its parts.
pub struct DaemonContext {
    pub services: ServiceContainer,
    pub engine: Arc<PollingEngine>,
    pub scheduler: SchedulerHandle,
    marker: PidMarker,
    tasks: Vec<JoinHandle<()>>,
}

impl DaemonContext {
    /// Start the scheduler and reload sources, then run the startup cycle.
    ///
    /// `marker` is released on any error via its drop. `hangup` must have
    /// been registered before `marker` was acquired.
    pub async fn start(
        services: ServiceContainer,
        marker: PidMarker,
        hangup: ReloadSignal,
    ) -> Result<(Self, PollSummary)> {
        let token = services.cancellation_token();
        let sink: Arc<dyn NotificationSink> = services.notifications.clone();
        let engine = Arc::new(services.polling_engine(sink.clone()));

        let (scheduler, handle) = Scheduler::new(
            engine.clone(),
            services.config.clone(),
            Arc::new(services.retention_sweeper()),
            token.clone(),
        )?;

        let mut tasks = Vec::new();

        tasks.push(hangup.spawn_listener(handle.clone(), token.clone()));

        tasks.push(reload::spawn_settings_watcher(
            services.config.clone(),
            handle.clone(),
            reload::SETTINGS_CHECK_INTERVAL,
            token.clone(),
        ));
        tasks.push(tokio::spawn(scheduler.run()));

        sink.notify(NotificationEvent::startup("Monitor")).await;

        info!("Running startup poll");
        let summary = engine.run_cycle().await;

        Ok((
            Self {
                services,
                engine,
                scheduler: handle,
                marker,
                tasks,
            },
            summary,
        ))
    }

    /// Stop background tasks, close storage and remove the process marker.
    pub async fn shutdown(self) {
        info!("Shutting down daemon");
        self.services.cancellation_token().cancel();

        for task in self.tasks {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await.is_err() {
                warn!("Background task did not stop within {:?}", SHUTDOWN_TIMEOUT);
            }
        }

        self.services.shutdown().await;
        self.marker.release();
    }
}
