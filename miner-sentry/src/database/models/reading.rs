//! Reading database models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::time::ms_to_datetime;

/// One stored telemetry sample.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ReadingDbModel {
    pub id: i64,
    pub miner_id: i64,
    /// Unix epoch milliseconds (UTC) of capture.
    pub timestamp: i64,
    pub hash_rate: f64,
    pub temperature: f64,
    pub best_diff: String,
    /// Volts. `0.0` means the device did not report voltage.
    pub voltage: f64,
    pub stratum_diff: i64,
    pub shares_accepted: i64,
    pub shares_rejected: i64,
    pub current_stratum_url: String,
}

impl ReadingDbModel {
    pub fn captured_at(&self) -> DateTime<Utc> {
        ms_to_datetime(self.timestamp)
    }
}

/// Reading fields supplied by the poller; the id is assigned on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub timestamp: i64,
    pub hash_rate: f64,
    pub temperature: f64,
    pub best_diff: String,
    pub voltage: f64,
    pub stratum_diff: i64,
    pub shares_accepted: i64,
    pub shares_rejected: i64,
    pub current_stratum_url: String,
}

impl NewReading {
    /// Minimal reading with the required metrics; optional fields default to zero/empty.
    pub fn new(timestamp: i64, hash_rate: f64, temperature: f64, best_diff: impl Into<String>) -> Self {
        Self {
            timestamp,
            hash_rate,
            temperature,
            best_diff: best_diff.into(),
            voltage: 0.0,
            stratum_diff: 0,
            shares_accepted: 0,
            shares_rejected: 0,
            current_stratum_url: String::new(),
        }
    }

    pub fn with_voltage(mut self, voltage: f64) -> Self {
        self.voltage = voltage;
        self
    }
}
