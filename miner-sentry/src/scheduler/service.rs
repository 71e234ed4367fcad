//! Tick / cron / reload loop driving the polling cycle.
//!
//! # Triggers
//!
//! - **Tick**: every configured poll interval, run one polling cycle.
//! - **Cron**: once a day, run the retention sweep.
//! - **Commands**: reload requests arriving on an mpsc channel.
//!
//! Everything runs on one task, so a tick and a sweep never overlap.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConfigService;
use crate::database::RetentionSweeper;
use crate::poller::PollingEngine;
use crate::{Error, Result};

/// Daily retention sweep at local midnight (sec min hour dom month dow).
pub const DEFAULT_CLEANUP_SCHEDULE: &str = "0 0 0 * * *";

/// Capacity of the command channel.
const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Requests delivered to a running scheduler.
#[derive(Debug)]
pub enum SchedulerCommand {
    /// Re-read settings and reschedule if the poll interval changed.
    Reload,
}

/// Cloneable handle for sending commands to the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Ask for a reload. Requests arriving while one is queued are coalesced.
    pub fn request_reload(&self) {
        match self.tx.try_send(SchedulerCommand::Reload) {
            Ok(()) => debug!("Reload requested"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Scheduler busy, reload request coalesced");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Reload requested but the scheduler has stopped");
            }
        }
    }
}

/// Drives the polling engine and the retention sweep.
pub struct Scheduler {
    engine: Arc<PollingEngine>,
    config: Arc<ConfigService>,
    sweeper: Arc<RetentionSweeper>,
    cleanup_schedule: cron::Schedule,
    commands: Option<mpsc::Receiver<SchedulerCommand>>,
    cancellation_token: CancellationToken,
}

impl Scheduler {
    pub fn new(
        engine: Arc<PollingEngine>,
        config: Arc<ConfigService>,
        sweeper: Arc<RetentionSweeper>,
        cancellation_token: CancellationToken,
    ) -> Result<(Self, SchedulerHandle)> {
        let cleanup_schedule = cron::Schedule::from_str(DEFAULT_CLEANUP_SCHEDULE)
            .map_err(|e| Error::config(format!("invalid cleanup schedule: {e}")))?;
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        let scheduler = Self {
            engine,
            config,
            sweeper,
            cleanup_schedule,
            commands: Some(rx),
            cancellation_token,
        };
        Ok((scheduler, SchedulerHandle { tx }))
    }

    /// Run until the cancellation token fires.
    ///
    /// The first tick is one interval after start; the caller runs the
    /// startup cycle itself.
    pub async fn run(mut self) {
        let interval = self.config.current().poll_interval();
        let mut next_tick = Instant::now() + interval;
        let mut next_cleanup = self.next_cleanup_deadline(Utc::now());
        let mut commands = self.commands.take();

        info!(
            "Scheduler started: polling every {} minutes",
            interval.as_secs() / 60
        );

        loop {
            tokio::select! {
                _ = self.cancellation_token.cancelled() => {
                    info!("Scheduler received cancellation signal");
                    break;
                }

                _ = sleep_until(next_tick) => {
                    if self.config.changed_on_disk() {
                        self.apply_reload(&mut next_tick);
                    }
                    self.engine.run_cycle().await;
                    next_tick = Instant::now() + self.config.current().poll_interval();
                }

                _ = sleep_until(next_cleanup) => {
                    self.run_cleanup().await;
                    next_cleanup = self.next_cleanup_deadline(Utc::now());
                }

                command = async {
                    match &mut commands {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match command {
                        Some(SchedulerCommand::Reload) => self.apply_reload(&mut next_tick),
                        None => {
                            debug!("All scheduler handles dropped");
                            commands = None;
                        }
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// Reload settings; a changed interval restarts the tick countdown from now.
    fn apply_reload(&self, next_tick: &mut Instant) {
        let diff = self.config.reload();
        if diff.poll_interval {
            let interval = self.config.current().poll_interval();
            *next_tick = Instant::now() + interval;
            info!(
                "Poll interval changed to {} minutes, next poll rescheduled",
                interval.as_secs() / 60
            );
        }
    }

    async fn run_cleanup(&self) {
        let retention_days = self.config.current().retention_days;
        info!("Running retention cleanup ({} days)", retention_days);
        if let Err(e) = self.sweeper.sweep(retention_days, Utc::now()).await {
            error!("Retention cleanup failed: {}", e);
        }
    }

    fn next_cleanup_deadline(&self, now: DateTime<Utc>) -> Instant {
        let wait = next_cleanup_after(&self.cleanup_schedule, now)
            .and_then(|at| (at - now).to_std().ok())
            .unwrap_or(Duration::from_secs(24 * 60 * 60));
        debug!("Next retention cleanup in {:?}", wait);
        Instant::now() + wait
    }
}

/// Next time `schedule` fires after `now`, evaluated in local time.
pub fn next_cleanup_after(schedule: &cron::Schedule, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule
        .after(&now.with_timezone(&Local))
        .next()
        .map(|at| at.with_timezone(&Utc))
}
