//! One full poll pass across the configured endpoints.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::alert::{AlertTracker, Thresholds};
use crate::config::ConfigService;
use crate::database::TelemetryRepository;
use crate::database::models::MinerDbModel;
use crate::database::time::now_ms;
use crate::device::{DeviceClient, DeviceFailure, FetchOutcome};
use crate::notification::{NotificationEvent, NotificationSink};
use crate::utils::url::derive_name;

/// Default number of device fetches in flight at once.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

/// Why one endpoint produced no reading this cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollFailure {
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miner_id: Option<i64>,
    /// `timeout`, `connect`, `status 503`, `malformed` or `storage`.
    pub kind: String,
    pub reason: String,
}

impl PollFailure {
    fn device(miner_id: i64, failure: &DeviceFailure) -> Self {
        Self {
            endpoint: failure.endpoint.clone(),
            miner_id: Some(miner_id),
            kind: failure.kind.to_string(),
            reason: failure.cause.clone(),
        }
    }

    fn storage(endpoint: &str, miner_id: Option<i64>, err: &crate::Error) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            miner_id,
            kind: "storage".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollSummary {
    /// Miners whose reading was stored.
    pub succeeded: usize,
    /// Configured endpoints.
    pub total: usize,
    pub failures: Vec<PollFailure>,
    /// Another cycle was already running; nothing was polled.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

/// Clears the running flag when the cycle ends or is dropped.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Orchestrates identity reconciliation, fetching, persistence and alerting.
pub struct PollingEngine {
    repo: Arc<dyn TelemetryRepository>,
    device: Arc<dyn DeviceClient>,
    config: Arc<ConfigService>,
    tracker: Arc<AlertTracker>,
    sink: Arc<dyn NotificationSink>,
    concurrency: usize,
    cycle_running: AtomicBool,
}

impl PollingEngine {
    pub fn new(
        repo: Arc<dyn TelemetryRepository>,
        device: Arc<dyn DeviceClient>,
        config: Arc<ConfigService>,
        tracker: Arc<AlertTracker>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            repo,
            device,
            config,
            tracker,
            sink,
            concurrency: DEFAULT_FETCH_CONCURRENCY,
            cycle_running: AtomicBool::new(false),
        }
    }

    pub fn tracker(&self) -> &Arc<AlertTracker> {
        &self.tracker
    }

    /// Poll every configured endpoint once.
    ///
    /// A failing endpoint is recorded in the summary and never aborts the rest
    /// of the cycle. A call made while another cycle is in flight returns at
    /// once with `skipped` set.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> PollSummary {
        if self
            .cycle_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Previous polling cycle still running, skipping");
            return PollSummary {
                skipped: true,
                ..PollSummary::default()
            };
        }
        let _running = CycleGuard(&self.cycle_running);

        let settings = self.config.current();
        let thresholds = Thresholds::from(settings.as_ref());

        let mut summary = PollSummary {
            total: settings.endpoints.len(),
            ..PollSummary::default()
        };

        if settings.endpoints.is_empty() {
            warn!("No miner endpoints configured, skipping poll");
            return summary;
        }

        info!("Starting polling cycle for {} endpoints", summary.total);

        let miners = self.resolve_miners(&settings.endpoints, &mut summary).await;
        self.prune_alert_state().await;

        let outcomes: Vec<(MinerDbModel, FetchOutcome)> = stream::iter(miners)
            .map(|miner| async move {
                debug!(endpoint = %miner.endpoint, "Polling miner");
                let outcome = self.device.fetch(&miner.endpoint).await;
                (miner, outcome)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        for (miner, outcome) in outcomes {
            match outcome {
                Ok(telemetry) => {
                    if self.record(&miner, &telemetry, &thresholds, &mut summary).await {
                        summary.succeeded += 1;
                    }
                }
                Err(failure) => self.handle_failure(&miner, failure, &mut summary).await,
            }
        }

        info!(
            "Completed polling cycle. Successful: {}/{}",
            summary.succeeded, summary.total
        );
        summary
    }

    /// Upsert a miner per endpoint, in configured order.
    async fn resolve_miners(
        &self,
        endpoints: &[String],
        summary: &mut PollSummary,
    ) -> Vec<MinerDbModel> {
        let mut miners = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            match self.repo.upsert_miner(endpoint, &derive_name(endpoint)).await {
                Ok(miner) => miners.push(miner),
                Err(e) => {
                    warn!(endpoint = %endpoint, "Failed to register miner: {}", e);
                    summary.failures.push(PollFailure::storage(endpoint, None, &e));
                }
            }
        }
        miners
    }

    /// Drop alert state of miners deleted since the last cycle.
    async fn prune_alert_state(&self) {
        match self.repo.list_miners().await {
            Ok(miners) => {
                let known: HashSet<i64> = miners.iter().map(|m| m.id).collect();
                let removed = self.tracker.retain_known(&known);
                if removed > 0 {
                    debug!("Dropped alert state for {} deleted miners", removed);
                }
            }
            Err(e) => debug!("Could not list miners for alert state pruning: {}", e),
        }
    }

    /// Persist a reading and evaluate alerts. Returns whether the reading was stored.
    async fn record(
        &self,
        miner: &MinerDbModel,
        telemetry: &crate::device::Telemetry,
        thresholds: &Thresholds,
        summary: &mut PollSummary,
    ) -> bool {
        let previous = match self.repo.latest_reading(miner.id).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!(miner = %miner.name, "Could not load previous reading: {}", e);
                None
            }
        };

        let reading = match self
            .repo
            .insert_reading(miner.id, &telemetry.to_new_reading(now_ms()))
            .await
        {
            Ok(reading) => reading,
            Err(e) => {
                warn!(miner = %miner.name, endpoint = %miner.endpoint, "Failed to store reading: {}", e);
                summary
                    .failures
                    .push(PollFailure::storage(&miner.endpoint, Some(miner.id), &e));
                return false;
            }
        };

        debug!(
            miner = %miner.name,
            "Stored reading: {:.2} MH/s, {:.1}°C, {:.2}V, best diff {}",
            reading.hash_rate,
            reading.temperature,
            reading.voltage,
            reading.best_diff
        );

        let alerts = self
            .tracker
            .on_reading(miner.id, previous.as_ref(), &reading, thresholds);
        for intent in alerts {
            warn!(miner = %miner.name, "Alert raised: {}", intent.kind());
            self.sink
                .notify(NotificationEvent::miner_alert(
                    &miner.name,
                    &miner.endpoint,
                    intent,
                    Some(&reading),
                ))
                .await;
        }
        true
    }

    async fn handle_failure(
        &self,
        miner: &MinerDbModel,
        failure: DeviceFailure,
        summary: &mut PollSummary,
    ) {
        warn!(
            endpoint = %failure.endpoint,
            miner = %miner.name,
            "Failed to poll miner: {}",
            failure
        );
        summary.failures.push(PollFailure::device(miner.id, &failure));

        let Some(intent) = self.tracker.on_failure(miner.id, &failure.cause) else {
            return;
        };

        warn!(miner = %miner.name, "Miner appears to be offline");
        let last_seen = match self.repo.latest_reading(miner.id).await {
            Ok(reading) => reading.map(|r| r.captured_at()),
            Err(e) => {
                debug!(miner = %miner.name, "Could not load last reading: {}", e);
                None
            }
        };
        self.sink
            .notify(
                NotificationEvent::miner_alert(&miner.name, &miner.endpoint, intent, None)
                    .with_last_seen(last_seen),
            )
            .await;
    }
}
