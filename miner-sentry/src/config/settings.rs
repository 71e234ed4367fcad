//! The operational settings record.

use serde::{Deserialize, Serialize};

use crate::utils::url::{normalize_endpoints, parse_endpoint_list, validate_endpoint};
use crate::{Error, Result};

pub const DEFAULT_POLL_INTERVAL_MINUTES: u32 = 15;
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
pub const DEFAULT_TEMP_MIN: f64 = 20.0;
pub const DEFAULT_TEMP_MAX: f64 = 70.0;
pub const DEFAULT_VOLT_MIN: f64 = 5.0;

/// Flat record of operational parameters shared by the daemon and the web process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSettings")]
pub struct Settings {
    pub poll_interval_minutes: u32,
    pub retention_days: u32,
    pub temp_min: f64,
    pub temp_max: f64,
    pub volt_min: f64,
    /// Normalized endpoints, in polling order.
    pub endpoints: Vec<String>,
    /// Webhook URL alerts are posted to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_target: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_minutes: DEFAULT_POLL_INTERVAL_MINUTES,
            retention_days: DEFAULT_RETENTION_DAYS,
            temp_min: DEFAULT_TEMP_MIN,
            temp_max: DEFAULT_TEMP_MAX,
            volt_min: DEFAULT_VOLT_MIN,
            endpoints: Vec::new(),
            notification_target: None,
        }
    }
}

/// Endpoints may be stored as a JSON array or as one comma-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum EndpointList {
    List(Vec<String>),
    Csv(String),
}

impl EndpointList {
    fn normalize(self) -> Vec<String> {
        match self {
            Self::List(items) => normalize_endpoints(items),
            Self::Csv(raw) => parse_endpoint_list(&raw),
        }
    }
}

/// On-disk shape with every field optional, so partial files pick up defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    #[serde(alias = "POLL_INTERVAL_MINUTES")]
    poll_interval_minutes: Option<u32>,
    #[serde(alias = "RETENTION_DAYS")]
    retention_days: Option<u32>,
    #[serde(alias = "TEMP_MIN")]
    temp_min: Option<f64>,
    #[serde(alias = "TEMP_MAX")]
    temp_max: Option<f64>,
    #[serde(alias = "VOLT_MIN")]
    volt_min: Option<f64>,
    #[serde(alias = "BITAXE_ENDPOINTS")]
    endpoints: Option<EndpointList>,
    #[serde(alias = "DISCORD_WEBHOOK_URL")]
    notification_target: Option<String>,
}

impl From<RawSettings> for Settings {
    fn from(raw: RawSettings) -> Self {
        let defaults = Settings::default();
        Self {
            poll_interval_minutes: raw
                .poll_interval_minutes
                .unwrap_or(defaults.poll_interval_minutes),
            retention_days: raw.retention_days.unwrap_or(defaults.retention_days),
            temp_min: raw.temp_min.unwrap_or(defaults.temp_min),
            temp_max: raw.temp_max.unwrap_or(defaults.temp_max),
            volt_min: raw.volt_min.unwrap_or(defaults.volt_min),
            endpoints: raw.endpoints.map(EndpointList::normalize).unwrap_or_default(),
            notification_target: normalize_target(raw.notification_target),
        }
    }
}

fn normalize_target(target: Option<String>) -> Option<String> {
    target
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

impl Settings {
    /// Parse a settings document, filling unset fields with defaults.
    ///
    /// The result is normalized and validated.
    pub fn from_json(raw: &str) -> Result<Self> {
        let raw: RawSettings = serde_json::from_str(raw)
            .map_err(|e| Error::config(format!("invalid settings document: {e}")))?;
        let settings = Settings::from(raw);
        settings.validate()?;
        Ok(settings)
    }

    /// Build settings from environment-style variables (container deployments).
    ///
    /// `lookup` returns the value of a variable, or `None` when unset.
    pub fn from_env_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: Option<String>) -> Result<Option<T>> {
            match value {
                None => Ok(None),
                Some(v) if v.trim().is_empty() => Ok(None),
                Some(v) => v
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| Error::config(format!("{key}: cannot parse '{v}'"))),
            }
        }

        let raw = RawSettings {
            poll_interval_minutes: parse("POLL_INTERVAL_MINUTES", lookup("POLL_INTERVAL_MINUTES"))?,
            retention_days: parse("RETENTION_DAYS", lookup("RETENTION_DAYS"))?,
            temp_min: parse("TEMP_MIN", lookup("TEMP_MIN"))?,
            temp_max: parse("TEMP_MAX", lookup("TEMP_MAX"))?,
            volt_min: parse("VOLT_MIN", lookup("VOLT_MIN"))?,
            endpoints: lookup("BITAXE_ENDPOINTS").map(EndpointList::Csv),
            notification_target: lookup("DISCORD_WEBHOOK_URL"),
        };
        let settings = Settings::from(raw);
        settings.validate()?;
        Ok(settings)
    }

    /// Re-apply endpoint and target normalization after an external edit.
    pub fn normalized(mut self) -> Self {
        self.endpoints = normalize_endpoints(&self.endpoints);
        self.notification_target = normalize_target(self.notification_target.take());
        self
    }

    /// Reject records that must never be applied.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_minutes == 0 {
            return Err(Error::config("poll_interval_minutes must be greater than 0"));
        }
        if self.retention_days == 0 {
            return Err(Error::config("retention_days must be greater than 0"));
        }
        for (name, value) in [
            ("temp_min", self.temp_min),
            ("temp_max", self.temp_max),
            ("volt_min", self.volt_min),
        ] {
            if !value.is_finite() {
                return Err(Error::config(format!("{name} must be a finite number")));
            }
        }
        if self.temp_min > self.temp_max {
            return Err(Error::config(format!(
                "temp_min ({}) must not exceed temp_max ({})",
                self.temp_min, self.temp_max
            )));
        }
        for endpoint in &self.endpoints {
            validate_endpoint(endpoint).map_err(Error::config)?;
        }
        Ok(())
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.poll_interval_minutes) * 60)
    }
}
