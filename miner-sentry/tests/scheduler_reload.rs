//! Scheduler timing under a paused clock.
//!
//! Storage is an in-memory fake so that no blocking database work races the
//! auto-advancing test clock.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miner_sentry::alert::AlertTracker;
use miner_sentry::config::{ConfigService, JsonFileStore, Settings};
use miner_sentry::database::models::{MinerDbModel, NewReading, ReadingDbModel};
use miner_sentry::database::{RetentionSweeper, TelemetryRepository};
use miner_sentry::device::{DeviceClient, DeviceFailure, FailureKind, FetchOutcome};
use miner_sentry::notification::DiscardSink;
use miner_sentry::poller::PollingEngine;
use miner_sentry::scheduler::{Scheduler, SchedulerHandle};
use miner_sentry::{Error, Result};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct MemoryRepository {
    miners: Mutex<Vec<MinerDbModel>>,
    readings: Mutex<Vec<ReadingDbModel>>,
}

#[async_trait]
impl TelemetryRepository for MemoryRepository {
    async fn upsert_miner(&self, endpoint: &str, name: &str) -> Result<MinerDbModel> {
        let mut miners = self.miners.lock();
        if let Some(m) = miners.iter().find(|m| m.endpoint == endpoint) {
            return Ok(m.clone());
        }
        let miner = MinerDbModel {
            id: miners.len() as i64 + 1,
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            added_at: 0,
        };
        miners.push(miner.clone());
        Ok(miner)
    }

    async fn get_miner(&self, id: i64) -> Result<MinerDbModel> {
        self.miners
            .lock()
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("Miner", id))
    }

    async fn list_miners(&self) -> Result<Vec<MinerDbModel>> {
        Ok(self.miners.lock().clone())
    }

    async fn delete_miner(&self, id: i64) -> Result<()> {
        self.miners.lock().retain(|m| m.id != id);
        self.readings.lock().retain(|r| r.miner_id != id);
        Ok(())
    }

    async fn insert_reading(&self, miner_id: i64, reading: &NewReading) -> Result<ReadingDbModel> {
        let mut readings = self.readings.lock();
        let stored = ReadingDbModel {
            id: readings.len() as i64 + 1,
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
        };
        readings.push(stored.clone());
        Ok(stored)
    }

    async fn latest_reading(&self, miner_id: i64) -> Result<Option<ReadingDbModel>> {
        Ok(self
            .readings
            .lock()
            .iter()
            .filter(|r| r.miner_id == miner_id)
            .max_by_key(|r| (r.timestamp, r.id))
            .cloned())
    }

    async fn readings_since(
        &self,
        _cutoff: DateTime<Utc>,
        _miner_id: Option<i64>,
    ) -> Result<Vec<ReadingDbModel>> {
        Ok(self.readings.lock().clone())
    }

    async fn delete_older_than(&self, _cutoff: DateTime<Utc>) -> Result<u64> {
        Ok(0)
    }
}

/// Device client that only counts how often it was asked.
#[derive(Default)]
struct CountingClient {
    calls: AtomicUsize,
}

impl CountingClient {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceClient for CountingClient {
    async fn fetch(&self, endpoint: &str) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DeviceFailure::new(endpoint, FailureKind::Connect, "unreachable"))
    }
}

struct Running {
    device: Arc<CountingClient>,
    handle: SchedulerHandle,
    token: CancellationToken,
    task: JoinHandle<()>,
}

fn start(config: Arc<ConfigService>) -> Running {
    let repo = Arc::new(MemoryRepository::default());
    let device = Arc::new(CountingClient::default());
    let engine = Arc::new(PollingEngine::new(
        repo.clone(),
        device.clone(),
        config.clone(),
        Arc::new(AlertTracker::new()),
        Arc::new(DiscardSink),
    ));
    let sweeper = Arc::new(RetentionSweeper::new(repo));
    let token = CancellationToken::new();

    let (scheduler, handle) = Scheduler::new(engine, config, sweeper, token.clone()).unwrap();
    let task = tokio::spawn(scheduler.run());
    Running {
        device,
        handle,
        token,
        task,
    }
}

async fn advance(minutes: u64, seconds: u64) {
    tokio::time::sleep(Duration::from_secs(minutes * 60 + seconds)).await;
}

#[tokio::test(start_paused = true)]
async fn test_ticks_follow_the_poll_interval() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::config_with(dir.path(), vec!["http://10.0.0.9".to_string()]);
    let running = start(config);
    tokio::task::yield_now().await;

    advance(14, 59).await;
    assert_eq!(running.device.calls(), 0);

    advance(0, 2).await;
    assert_eq!(running.device.calls(), 1);

    advance(15, 0).await;
    assert_eq!(running.device.calls(), 2);

    running.token.cancel();
    running.task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reload_with_shorter_interval_reschedules_next_tick() {
    let dir = tempfile::tempdir().unwrap();
    let config = common::config_with(dir.path(), vec!["http://10.0.0.9".to_string()]);
    assert_eq!(config.current().poll_interval_minutes, 15);
    let running = start(config);
    tokio::task::yield_now().await;

    advance(1, 0).await;

    // Another process (the web UI) rewrites the settings file.
    let editor = ConfigService::new(Arc::new(JsonFileStore::new(dir.path().join("settings.json"))));
    editor.load();
    editor
        .save(Settings {
            poll_interval_minutes: 5,
            ..(*editor.current()).clone()
        })
        .unwrap();
    running.handle.request_reload();

    advance(4, 59).await;
    assert_eq!(running.device.calls(), 0);

    advance(0, 2).await;
    assert_eq!(running.device.calls(), 1);

    advance(5, 0).await;
    assert_eq!(running.device.calls(), 2);

    running.token.cancel();
    running.task.await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_hangup_received_before_listener_runs_triggers_reload() {
    use miner_sentry::reload::ReloadSignal;

    let dir = tempfile::tempdir().unwrap();
    let config = common::config_with(dir.path(), vec!["http://10.0.0.9".to_string()]);
    let hangup = ReloadSignal::register().unwrap();
    let running = start(config.clone());

    let editor = ConfigService::new(Arc::new(JsonFileStore::new(dir.path().join("settings.json"))));
    editor.load();
    editor
        .save(Settings {
            poll_interval_minutes: 5,
            ..(*editor.current()).clone()
        })
        .unwrap();

    // Delivered before the listener task exists; the registered stream keeps it.
    let rc = unsafe { libc::kill(libc::getpid(), libc::SIGHUP) };
    assert_eq!(rc, 0);
    let listener = hangup.spawn_listener(running.handle.clone(), running.token.clone());

    let reloaded = tokio::time::timeout(Duration::from_secs(5), async {
        while config.current().poll_interval_minutes != 5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(reloaded.is_ok(), "SIGHUP did not reload settings");
    assert_eq!(running.device.calls(), 0);

    running.token.cancel();
    running.task.await.unwrap();
    listener.await.unwrap();
}
