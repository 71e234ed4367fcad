//! Producers of reload requests inside the daemon.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ConfigService;
use crate::scheduler::SchedulerHandle;

/// How often the settings file's modification time is checked.
pub const SETTINGS_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// SIGHUP stream, registered before the process marker is published so a
/// reload request can never terminate the daemon.
pub struct ReloadSignal {
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

impl ReloadSignal {
    #[cfg(unix)]
    pub fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
        })
    }

    #[cfg(not(unix))]
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Forward every SIGHUP to the scheduler as a reload request.
    pub fn spawn_listener(
        self,
        handle: SchedulerHandle,
        cancellation_token: CancellationToken,
    ) -> JoinHandle<()> {
        #[cfg(unix)]
        let mut hangup = self.hangup;

        tokio::spawn(async move {
            #[cfg(unix)]
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    received = hangup.recv() => {
                        if received.is_none() {
                            break;
                        }
                        info!("Received SIGHUP, reloading settings");
                        handle.request_reload();
                    }
                }
            }

            #[cfg(not(unix))]
            {
                let _ = handle;
                cancellation_token.cancelled().await;
            }

            debug!("Reload signal listener stopped");
        })
    }
}

/// Periodically compare the settings store with what was last loaded.
pub fn spawn_settings_watcher(
    config: Arc<ConfigService>,
    handle: SchedulerHandle,
    period: Duration,
    cancellation_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                _ = ticker.tick() => {
                    if config.changed_on_disk() {
                        info!("Settings changed on disk, requesting reload");
                        handle.request_reload();
                    }
                }
            }
        }
        debug!("Settings watcher stopped");
    })
}
