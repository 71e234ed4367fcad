//! Field-level comparison between two settings records.

use super::settings::Settings;

/// Which groups of settings differ between two records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigDiff {
    pub poll_interval: bool,
    pub retention: bool,
    pub thresholds: bool,
    pub endpoints: bool,
    pub notification_target: bool,
}

impl ConfigDiff {
    pub fn between(old: &Settings, new: &Settings) -> Self {
        Self {
            poll_interval: old.poll_interval_minutes != new.poll_interval_minutes,
            retention: old.retention_days != new.retention_days,
            thresholds: old.temp_min != new.temp_min
                || old.temp_max != new.temp_max
                || old.volt_min != new.volt_min,
            endpoints: old.endpoints != new.endpoints,
            notification_target: old.notification_target != new.notification_target,
        }
    }

    /// True when nothing material changed.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Names of the changed groups, for logging.
    pub fn changed(&self) -> Vec<&'static str> {
        [
            (self.poll_interval, "poll_interval"),
            (self.retention, "retention"),
            (self.thresholds, "thresholds"),
            (self.endpoints, "endpoints"),
            (self.notification_target, "notification_target"),
        ]
        .into_iter()
        .filter_map(|(changed, name)| changed.then_some(name))
        .collect()
    }
}
