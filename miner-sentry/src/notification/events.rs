//! Notification events.
//!
//! Defines the events that can trigger notifications and their priority levels.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::alert::{AlertIntent, AlertKind};
use crate::database::models::ReadingDbModel;

/// Priority level for notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
pub enum NotificationPriority {
    /// Informational only.
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Metrics quoted in an alert message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingSummary {
    pub hash_rate: f64,
    pub temperature: f64,
    pub voltage: f64,
    pub best_diff: String,
}

impl From<&ReadingDbModel> for ReadingSummary {
    fn from(reading: &ReadingDbModel) -> Self {
        Self {
            hash_rate: reading.hash_rate,
            temperature: reading.temperature,
            voltage: reading.voltage,
            best_diff: reading.best_diff.clone(),
        }
    }
}

impl ReadingSummary {
    fn metrics_line(&self) -> String {
        format!(
            "Temperature: {:.1}°C | Voltage: {:.2}V | Hash Rate: {:.2} MH/s | Best Diff: {}",
            self.temperature, self.voltage, self.hash_rate, self.best_diff
        )
    }
}

/// Events that can trigger notifications.
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    /// An alert raised by the alert policy for one miner.
    MinerAlert {
        miner_name: String,
        endpoint: String,
        intent: AlertIntent,
        /// The reading that triggered the alert; absent for offline alerts.
        reading: Option<ReadingSummary>,
        /// Capture time of the last stored reading, for offline alerts.
        last_seen: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    },
    /// A process started.
    SystemStartup {
        service: String,
        version: String,
        timestamp: DateTime<Utc>,
    },
    /// Operator-requested check of the notification target.
    Test { timestamp: DateTime<Utc> },
}

impl NotificationEvent {
    pub fn miner_alert(
        miner_name: impl Into<String>,
        endpoint: impl Into<String>,
        intent: AlertIntent,
        reading: Option<&ReadingDbModel>,
    ) -> Self {
        Self::MinerAlert {
            miner_name: miner_name.into(),
            endpoint: endpoint.into(),
            intent,
            reading: reading.map(ReadingSummary::from),
            last_seen: None,
            timestamp: Utc::now(),
        }
    }

    pub fn startup(service: impl Into<String>) -> Self {
        Self::SystemStartup {
            service: service.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn test() -> Self {
        Self::Test {
            timestamp: Utc::now(),
        }
    }

    /// Attach the last time the miner was seen (offline alerts).
    pub fn with_last_seen(mut self, seen: Option<DateTime<Utc>>) -> Self {
        if let Self::MinerAlert { last_seen, .. } = &mut self {
            *last_seen = seen;
        }
        self
    }

    pub fn priority(&self) -> NotificationPriority {
        match self {
            Self::MinerAlert { intent, .. } => match intent.kind() {
                AlertKind::Temperature | AlertKind::Voltage => NotificationPriority::High,
                AlertKind::Offline => NotificationPriority::Critical,
                AlertKind::BestDiff => NotificationPriority::Normal,
            },
            Self::SystemStartup { .. } => NotificationPriority::Normal,
            Self::Test { .. } => NotificationPriority::Low,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MinerAlert { intent, .. } => match intent.kind() {
                AlertKind::Temperature => "temperature_alert",
                AlertKind::Voltage => "voltage_alert",
                AlertKind::BestDiff => "best_diff",
                AlertKind::Offline => "miner_offline",
            },
            Self::SystemStartup { .. } => "system_startup",
            Self::Test { .. } => "test",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::MinerAlert { timestamp, .. }
            | Self::SystemStartup { timestamp, .. }
            | Self::Test { timestamp } => *timestamp,
        }
    }

    pub fn title(&self) -> String {
        match self {
            Self::MinerAlert {
                miner_name, intent, ..
            } => match intent {
                AlertIntent::TemperatureOutOfRange { .. } => {
                    format!("🔥 {miner_name}: temperature out of range")
                }
                AlertIntent::VoltageLow { .. } => format!("⚡ {miner_name}: voltage low"),
                AlertIntent::NewBestDiff { .. } => format!("🎉 {miner_name}: new best diff"),
                AlertIntent::Offline { .. } => format!("🔴 {miner_name} is OFFLINE"),
            },
            Self::SystemStartup { service, .. } => format!("🚀 Miner Sentry {service} started"),
            Self::Test { .. } => "🧪 Miner Sentry test notification".to_string(),
        }
    }

    /// Plain-text body; embeds the miner name, metric values and alert kind.
    pub fn description(&self) -> String {
        match self {
            Self::MinerAlert {
                miner_name,
                endpoint,
                intent,
                reading,
                last_seen,
                ..
            } => {
                let headline = match intent {
                    AlertIntent::TemperatureOutOfRange { value, min, max } => format!(
                        "⚠️ **{miner_name}** temperature out of range: {value:.1}°C (allowed {min:.1}-{max:.1}°C)"
                    ),
                    AlertIntent::VoltageLow { value, min } => format!(
                        "⚠️ **{miner_name}** voltage out of range: {value:.2}V (minimum {min:.2}V)"
                    ),
                    AlertIntent::NewBestDiff { previous, current } => format!(
                        "🎉 **{miner_name}** new best diff! {current} (was {previous})"
                    ),
                    AlertIntent::Offline { cause } => format!(
                        "🔴 **{miner_name}** is **OFFLINE**\nFailed to respond to latest polling event ({cause})"
                    ),
                };

                let mut lines = vec![headline];
                if let Some(reading) = reading {
                    lines.push(reading.metrics_line());
                }
                if let Some(seen) = last_seen {
                    lines.push(format!(
                        "Last seen: {}",
                        seen.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
                    ));
                }
                lines.push(format!("Alert: {} | Endpoint: {}", intent.kind(), endpoint));
                lines.join("\n")
            }
            Self::SystemStartup {
                service,
                version,
                timestamp,
            } => format!(
                "🚀 **Miner Sentry {service}** v{version} started at {}\n✅ Notifications are working correctly!",
                timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            ),
            Self::Test { timestamp } => format!(
                "🧪 **Miner Sentry Test Notification**\n✅ This is a test message sent at {}\n✅ The webhook is configured correctly!",
                timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
            ),
        }
    }
}
