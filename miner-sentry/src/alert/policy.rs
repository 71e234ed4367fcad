//! Edge-triggered alert evaluation.
//!
//! Every function here is pure: it takes the previous per-miner state and an
//! observation and returns the next state plus the alerts to deliver.

use serde::Serialize;

use crate::config::Settings;
use crate::database::models::ReadingDbModel;

/// Operational bounds a reading is checked against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub temp_min: f64,
    pub temp_max: f64,
    pub volt_min: f64,
}

impl From<&Settings> for Thresholds {
    fn from(settings: &Settings) -> Self {
        Self {
            temp_min: settings.temp_min,
            temp_max: settings.temp_max,
            volt_min: settings.volt_min,
        }
    }
}

/// Kind of alert, used for logging and message titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Temperature,
    Voltage,
    BestDiff,
    Offline,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Voltage => "voltage",
            Self::BestDiff => "best_diff",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert the policy decided to raise.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertIntent {
    TemperatureOutOfRange { value: f64, min: f64, max: f64 },
    VoltageLow { value: f64, min: f64 },
    NewBestDiff { previous: String, current: String },
    Offline { cause: String },
}

impl AlertIntent {
    pub fn kind(&self) -> AlertKind {
        match self {
            Self::TemperatureOutOfRange { .. } => AlertKind::Temperature,
            Self::VoltageLow { .. } => AlertKind::Voltage,
            Self::NewBestDiff { .. } => AlertKind::BestDiff,
            Self::Offline { .. } => AlertKind::Offline,
        }
    }
}

/// Per-miner dedup state. Lives only in the daemon's memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinerAlertState {
    pub temperature_alerted: bool,
    pub voltage_alerted: bool,
    pub offline_alerted: bool,
    pub last_best_diff: Option<String>,
}

pub fn temperature_out_of_range(temperature: f64, thresholds: &Thresholds) -> bool {
    temperature < thresholds.temp_min || temperature > thresholds.temp_max
}

/// `0.0` means the device did not report voltage and never counts as low.
pub fn voltage_low(voltage: f64, thresholds: &Thresholds) -> bool {
    voltage != 0.0 && voltage < thresholds.volt_min
}

/// Evaluate a freshly stored reading.
///
/// `previous` is the miner's prior stored reading, consulted for the best
/// difficulty only when the in-memory state has none (after a restart).
pub fn evaluate_reading(
    state: &MinerAlertState,
    previous: Option<&ReadingDbModel>,
    reading: &ReadingDbModel,
    thresholds: &Thresholds,
) -> (MinerAlertState, Vec<AlertIntent>) {
    let mut next = state.clone();
    let mut alerts = Vec::new();

    // A successful poll re-arms the offline alert.
    next.offline_alerted = false;

    let temp_bad = temperature_out_of_range(reading.temperature, thresholds);
    if temp_bad && !state.temperature_alerted {
        alerts.push(AlertIntent::TemperatureOutOfRange {
            value: reading.temperature,
            min: thresholds.temp_min,
            max: thresholds.temp_max,
        });
    }
    next.temperature_alerted = temp_bad;

    let volt_bad = voltage_low(reading.voltage, thresholds);
    if volt_bad && !state.voltage_alerted {
        alerts.push(AlertIntent::VoltageLow {
            value: reading.voltage,
            min: thresholds.volt_min,
        });
    }
    next.voltage_alerted = volt_bad;

    let prior_best = state
        .last_best_diff
        .clone()
        .or_else(|| previous.map(|p| p.best_diff.clone()));
    if let Some(prior_best) = prior_best
        && prior_best != reading.best_diff
    {
        alerts.push(AlertIntent::NewBestDiff {
            previous: prior_best,
            current: reading.best_diff.clone(),
        });
    }
    next.last_best_diff = Some(reading.best_diff.clone());

    (next, alerts)
}

/// Evaluate a failed poll of a known miner.
pub fn evaluate_failure(state: &MinerAlertState, cause: &str) -> (MinerAlertState, Option<AlertIntent>) {
    let mut next = state.clone();
    next.offline_alerted = true;

    let alert = (!state.offline_alerted).then(|| AlertIntent::Offline {
        cause: cause.to_string(),
    });
    (next, alert)
}
