//! Device telemetry and its wire format.

use serde::Deserialize;
use serde_json::Value;

use crate::database::models::NewReading;

/// One successful observation of a miner.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub hash_rate: f64,
    /// Degrees Celsius.
    pub temperature: f64,
    pub best_diff: String,
    /// Volts; `0.0` when the device did not report voltage.
    pub voltage: f64,
    pub stratum_diff: i64,
    pub shares_accepted: i64,
    pub shares_rejected: i64,
    pub current_stratum_url: String,
}

impl Telemetry {
    /// Reading row for this observation, stamped at `timestamp` (epoch ms).
    pub fn to_new_reading(&self, timestamp: i64) -> NewReading {
        NewReading {
            timestamp,
            hash_rate: self.hash_rate,
            temperature: self.temperature,
            best_diff: self.best_diff.clone(),
            voltage: self.voltage,
            stratum_diff: self.stratum_diff,
            shares_accepted: self.shares_accepted,
            shares_rejected: self.shares_rejected,
            current_stratum_url: self.current_stratum_url.clone(),
        }
    }

    /// Parse the body of `/api/system/info`.
    pub fn from_system_info(body: &[u8]) -> Result<Self, String> {
        let info: SystemInfo = serde_json::from_slice(body).map_err(|e| e.to_string())?;
        info.into_telemetry()
    }
}

/// Firmware reports best difficulty either as a formatted string or a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BestDiff {
    Text(String),
    Number(serde_json::Number),
}

impl BestDiff {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Subset of the device status document we consume; unknown fields are ignored.
///
/// Only `hashRate`, `temp` and `bestDiff` are required. The optional fields are
/// read loosely: a value of an unexpected type is treated as absent rather
/// than rejecting the reading.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SystemInfo {
    hash_rate: f64,
    temp: f64,
    best_diff: BestDiff,
    /// Millivolts.
    #[serde(default)]
    voltage: Option<Value>,
    #[serde(default)]
    stratum_diff: Option<Value>,
    #[serde(default)]
    shares_accepted: Option<Value>,
    #[serde(default)]
    shares_rejected: Option<Value>,
    #[serde(default)]
    is_using_fallback_stratum: Option<Value>,
    #[serde(default, rename = "stratumURL")]
    stratum_url: Option<Value>,
    #[serde(default)]
    stratum_port: Option<Value>,
    #[serde(default)]
    stratum_user: Option<Value>,
    #[serde(default, rename = "fallbackStratumURL")]
    fallback_stratum_url: Option<Value>,
    #[serde(default)]
    fallback_stratum_port: Option<Value>,
    #[serde(default)]
    fallback_stratum_user: Option<Value>,
}

impl SystemInfo {
    fn into_telemetry(self) -> Result<Telemetry, String> {
        if !self.hash_rate.is_finite() || !self.temp.is_finite() {
            return Err("non-finite hashRate or temp".to_string());
        }

        let using_fallback = loose_bool(self.is_using_fallback_stratum.as_ref());
        let current_stratum_url = if using_fallback {
            stratum_url(
                loose_str(self.fallback_stratum_user.as_ref()),
                loose_str(self.fallback_stratum_url.as_ref()),
                loose_f64(self.fallback_stratum_port.as_ref()),
            )
        } else {
            stratum_url(
                loose_str(self.stratum_user.as_ref()),
                loose_str(self.stratum_url.as_ref()),
                loose_f64(self.stratum_port.as_ref()),
            )
        };

        Ok(Telemetry {
            hash_rate: self.hash_rate,
            temperature: self.temp,
            best_diff: self.best_diff.into_string(),
            voltage: millivolts_to_volts(loose_f64(self.voltage.as_ref())),
            stratum_diff: counter(loose_f64(self.stratum_diff.as_ref())),
            shares_accepted: counter(loose_f64(self.shares_accepted.as_ref())),
            shares_rejected: counter(loose_f64(self.shares_rejected.as_ref())),
            current_stratum_url,
        })
    }
}

/// A number, or a string holding one.
fn loose_f64(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Older firmware sends `0`/`1` (or their string forms) instead of a JSON boolean.
fn loose_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        _ => false,
    }
}

fn loose_str(value: Option<&Value>) -> Option<&str> {
    match value? {
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}

fn millivolts_to_volts(mv: Option<f64>) -> f64 {
    match mv {
        Some(mv) if mv.is_finite() && mv != 0.0 => mv / 1000.0,
        _ => 0.0,
    }
}

fn counter(value: Option<f64>) -> i64 {
    value.map(|v| v as i64).unwrap_or(0)
}

fn stratum_url(user: Option<&str>, host: Option<&str>, port: Option<f64>) -> String {
    match host.map(str::trim).filter(|h| !h.is_empty()) {
        Some(host) => format!(
            "stratum+tcp://{}@{}:{}",
            user.unwrap_or_default(),
            host,
            port.filter(|p| *p >= 0.0).map(|p| p as u32).unwrap_or_default()
        ),
        None => String::new(),
    }
}
