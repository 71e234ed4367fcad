//! Full polling cycles against stub devices and a real database.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miner_sentry::alert::{AlertKind, AlertTracker};
use miner_sentry::database::models::{MinerDbModel, NewReading, ReadingDbModel};
use miner_sentry::database::{SqlxTelemetryRepository, TelemetryRepository};
use miner_sentry::device::{DeviceClient, DeviceFailure, FailureKind, FetchOutcome, HttpDeviceClient};
use miner_sentry::notification::{DiscardSink, NotificationEvent, RecordingSink};
use miner_sentry::poller::PollingEngine;
use miner_sentry::utils::url::derive_name;
use miner_sentry::{Error, Result};
use serde_json::json;
use tokio::sync::Notify;

use common::{StubMiner, config_with, refused_endpoint, setup_test_db, system_info};

struct Harness {
    engine: PollingEngine,
    repo: Arc<SqlxTelemetryRepository>,
    sink: Arc<RecordingSink>,
    _dir: tempfile::TempDir,
}

async fn harness(endpoints: Vec<String>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(SqlxTelemetryRepository::new(setup_test_db().await));
    let sink = Arc::new(RecordingSink::new());
    let engine = PollingEngine::new(
        repo.clone(),
        Arc::new(HttpDeviceClient::default()),
        config_with(dir.path(), endpoints),
        Arc::new(AlertTracker::new()),
        sink.clone(),
    );
    Harness {
        engine,
        repo,
        sink,
        _dir: dir,
    }
}

fn alert_kinds(sink: &RecordingSink) -> Vec<AlertKind> {
    sink.events()
        .into_iter()
        .filter_map(|event| match event {
            NotificationEvent::MinerAlert { intent, .. } => Some(intent.kind()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_cycle_with_one_reachable_and_one_refused_endpoint() {
    let miner = StubMiner::new(system_info(450.0, 55.0, "12.3M", 5200.0));
    let good = miner.start().await;
    let bad = refused_endpoint().await;

    let h = harness(vec![good.clone(), bad.clone()]).await;
    let summary = h.engine.run_cycle().await;

    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].endpoint, bad);

    let miners = h.repo.list_miners().await.unwrap();
    assert_eq!(miners.len(), 2);
    assert_eq!(miners[0].endpoint, good);
    assert_eq!(miners[0].name, derive_name(&good));

    let reading = h.repo.latest_reading(miners[0].id).await.unwrap().unwrap();
    assert_eq!(reading.hash_rate, 450.0);
    assert_eq!(reading.temperature, 55.0);
    assert_eq!(reading.best_diff, "12.3M");
    assert!((reading.voltage - 5.2).abs() < 1e-9);
    assert_eq!(
        reading.current_stratum_url,
        "stratum+tcp://bc1qexample.worker@public-pool.io:21496"
    );
    assert!(h.repo.latest_reading(miners[1].id).await.unwrap().is_none());

    // The refused endpoint raises exactly one offline alert.
    assert_eq!(alert_kinds(&h.sink), vec![AlertKind::Offline]);
}

#[tokio::test]
async fn test_no_endpoints_is_a_noop() {
    let h = harness(Vec::new()).await;
    let summary = h.engine.run_cycle().await;

    assert_eq!(summary.total, 0);
    assert_eq!(summary.succeeded, 0);
    assert!(h.repo.list_miners().await.unwrap().is_empty());
    assert!(h.sink.events().is_empty());
}

#[tokio::test]
async fn test_temperature_alerts_fire_on_transitions_only() {
    let miner = StubMiner::new(system_info(450.0, 50.0, "1M", 5200.0));
    let endpoint = miner.start().await;
    let h = harness(vec![endpoint]).await;

    let mut fired = Vec::new();
    for temp in [50.0, 80.0, 85.0, 50.0, 90.0] {
        miner.set(system_info(450.0, temp, "1M", 5200.0));
        h.sink.clear();
        h.engine.run_cycle().await;
        fired.push(alert_kinds(&h.sink));
    }

    assert_eq!(
        fired,
        vec![
            vec![],
            vec![AlertKind::Temperature],
            vec![],
            vec![],
            vec![AlertKind::Temperature],
        ]
    );
}

#[tokio::test]
async fn test_low_voltage_and_best_diff_alerts() {
    let miner = StubMiner::new(system_info(450.0, 50.0, "1M", 5200.0));
    let endpoint = miner.start().await;
    let h = harness(vec![endpoint]).await;

    h.engine.run_cycle().await;
    assert!(alert_kinds(&h.sink).is_empty());

    miner.set(system_info(450.0, 50.0, "2M", 4800.0));
    h.engine.run_cycle().await;
    let kinds = alert_kinds(&h.sink);
    assert!(kinds.contains(&AlertKind::Voltage));
    assert!(kinds.contains(&AlertKind::BestDiff));

    // Zero voltage means "not reported" and never alerts.
    h.sink.clear();
    miner.set(system_info(450.0, 50.0, "2M", 0.0));
    h.engine.run_cycle().await;
    assert!(alert_kinds(&h.sink).is_empty());
}

#[tokio::test]
async fn test_offline_alert_rearms_after_recovery() {
    let healthy = system_info(450.0, 50.0, "1M", 5200.0);
    let miner = StubMiner::new(healthy.clone());
    let endpoint = miner.start().await;
    let h = harness(vec![endpoint]).await;

    let mut offline_alerts = Vec::new();
    for up in [true, false, false, true, false] {
        // A malformed status document counts as a failed poll.
        miner.set(if up { healthy.clone() } else { json!("garbage") });
        h.sink.clear();
        let summary = h.engine.run_cycle().await;
        assert_eq!(summary.succeeded, usize::from(up));
        offline_alerts.push(alert_kinds(&h.sink).contains(&AlertKind::Offline));
    }

    assert_eq!(offline_alerts, vec![false, true, false, false, true]);

    let miner_id = h.repo.list_miners().await.unwrap()[0].id;
    assert!(h.engine.tracker().state(miner_id).unwrap().offline_alerted);
}

/// Real storage whose reading inserts fail for one endpoint.
struct FailingInserts {
    inner: SqlxTelemetryRepository,
    broken_endpoint: String,
}

#[async_trait]
impl TelemetryRepository for FailingInserts {
    async fn upsert_miner(&self, endpoint: &str, name: &str) -> Result<MinerDbModel> {
        self.inner.upsert_miner(endpoint, name).await
    }

    async fn get_miner(&self, id: i64) -> Result<MinerDbModel> {
        self.inner.get_miner(id).await
    }

    async fn list_miners(&self) -> Result<Vec<MinerDbModel>> {
        self.inner.list_miners().await
    }

    async fn delete_miner(&self, id: i64) -> Result<()> {
        self.inner.delete_miner(id).await
    }

    async fn insert_reading(&self, miner_id: i64, reading: &NewReading) -> Result<ReadingDbModel> {
        let miner = self.inner.get_miner(miner_id).await?;
        if miner.endpoint == self.broken_endpoint {
            return Err(Error::Other("disk I/O error".to_string()));
        }
        self.inner.insert_reading(miner_id, reading).await
    }

    async fn latest_reading(&self, miner_id: i64) -> Result<Option<ReadingDbModel>> {
        self.inner.latest_reading(miner_id).await
    }

    async fn readings_since(
        &self,
        cutoff: DateTime<Utc>,
        miner_id: Option<i64>,
    ) -> Result<Vec<ReadingDbModel>> {
        self.inner.readings_since(cutoff, miner_id).await
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.inner.delete_older_than(cutoff).await
    }
}

#[tokio::test]
async fn test_storage_failure_for_one_miner_does_not_stop_the_others() {
    let broken = StubMiner::new(system_info(450.0, 50.0, "1M", 5200.0));
    let healthy = StubMiner::new(system_info(500.0, 52.0, "2M", 5200.0));
    let broken_endpoint = broken.start().await;
    let healthy_endpoint = healthy.start().await;

    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(FailingInserts {
        inner: SqlxTelemetryRepository::new(setup_test_db().await),
        broken_endpoint: broken_endpoint.clone(),
    });
    let sink = Arc::new(RecordingSink::new());
    let engine = PollingEngine::new(
        repo.clone(),
        Arc::new(HttpDeviceClient::default()),
        config_with(dir.path(), vec![broken_endpoint.clone(), healthy_endpoint.clone()]),
        Arc::new(AlertTracker::new()),
        sink.clone(),
    );

    let summary = engine.run_cycle().await;

    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].endpoint, broken_endpoint);
    assert_eq!(summary.failures[0].kind, "storage");

    let miners = repo.list_miners().await.unwrap();
    let stored = repo.latest_reading(miners[1].id).await.unwrap().unwrap();
    assert_eq!(miners[1].endpoint, healthy_endpoint);
    assert_eq!(stored.hash_rate, 500.0);
    assert!(repo.latest_reading(miners[0].id).await.unwrap().is_none());

    // A storage failure is not an outage.
    assert!(alert_kinds(&sink).is_empty());
}

/// Device whose fetches wait until the test lets them finish.
#[derive(Default)]
struct GatedClient {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl DeviceClient for GatedClient {
    async fn fetch(&self, endpoint: &str) -> FetchOutcome {
        self.entered.notify_one();
        self.release.notified().await;
        Err(DeviceFailure::new(endpoint, FailureKind::Timeout, "timed out"))
    }
}

#[tokio::test]
async fn test_overlapping_cycle_is_skipped_without_waiting() {
    let dir = tempfile::tempdir().unwrap();
    let device = Arc::new(GatedClient::default());
    let engine = PollingEngine::new(
        Arc::new(SqlxTelemetryRepository::new(setup_test_db().await)),
        device.clone(),
        config_with(dir.path(), vec!["http://10.0.0.9".to_string()]),
        Arc::new(AlertTracker::new()),
        Arc::new(DiscardSink),
    );

    let first = engine.run_cycle();
    let second = async {
        device.entered.notified().await;
        // The first cycle is parked inside a device fetch.
        let summary = engine.run_cycle().await;
        device.release.notify_one();
        summary
    };
    let (first, second) = tokio::join!(first, second);

    assert!(second.skipped);
    assert_eq!(second.total, 0);
    assert!(!first.skipped);
    assert_eq!(first.total, 1);
    assert_eq!(first.failures[0].kind, "timeout");

    // Once the first cycle finished the engine accepts new ones.
    device.release.notify_one();
    let third = engine.run_cycle().await;
    assert!(!third.skipped);
    assert_eq!(third.total, 1);
}

#[tokio::test]
async fn test_deleted_miner_alert_state_is_dropped() {
    let first = refused_endpoint().await;
    let second = refused_endpoint().await;
    let h = harness(vec![first.clone(), second.clone()]).await;

    h.engine.run_cycle().await;
    assert_eq!(alert_kinds(&h.sink), vec![AlertKind::Offline, AlertKind::Offline]);

    let miners = h.repo.list_miners().await.unwrap();
    let deleted = miners[0].id;
    assert_eq!(miners[0].endpoint, first);
    assert!(h.engine.tracker().state(deleted).is_some());
    h.repo.delete_miner(deleted).await.unwrap();

    // The endpoint is still configured, so the miner comes back under a new id
    // and its outage is reported afresh.
    h.sink.clear();
    h.engine.run_cycle().await;
    assert!(h.engine.tracker().state(deleted).is_none());
    assert_eq!(alert_kinds(&h.sink), vec![AlertKind::Offline]);

    let recreated = h.repo.list_miners().await.unwrap();
    assert_eq!(recreated.len(), 2);
    assert!(recreated.iter().all(|m| m.id != deleted));
}
