//! Per-miner alert dedup state shared by the polling cycle.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use super::policy::{AlertIntent, MinerAlertState, Thresholds, evaluate_failure, evaluate_reading};
use crate::database::models::ReadingDbModel;

/// In-memory dedup state keyed by miner id. Reset on process restart.
#[derive(Debug, Default)]
pub struct AlertTracker {
    states: Mutex<HashMap<i64, MinerAlertState>>,
}

impl AlertTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a stored reading and return the alerts to deliver.
    pub fn on_reading(
        &self,
        miner_id: i64,
        previous: Option<&ReadingDbModel>,
        reading: &ReadingDbModel,
        thresholds: &Thresholds,
    ) -> Vec<AlertIntent> {
        let mut states = self.states.lock();
        let state = states.entry(miner_id).or_default();
        let (next, alerts) = evaluate_reading(state, previous, reading, thresholds);
        *state = next;
        alerts
    }

    /// Apply a failed poll and return the offline alert if this is a new outage.
    pub fn on_failure(&self, miner_id: i64, cause: &str) -> Option<AlertIntent> {
        let mut states = self.states.lock();
        let state = states.entry(miner_id).or_default();
        let (next, alert) = evaluate_failure(state, cause);
        *state = next;
        alert
    }

    /// Keep state only for miners in `known`; returns how many entries were dropped.
    pub fn retain_known(&self, known: &HashSet<i64>) -> usize {
        let mut states = self.states.lock();
        let before = states.len();
        states.retain(|id, _| known.contains(id));
        before - states.len()
    }

    /// Snapshot of one miner's state.
    pub fn state(&self, miner_id: i64) -> Option<MinerAlertState> {
        self.states.lock().get(&miner_id).cloned()
    }
}
