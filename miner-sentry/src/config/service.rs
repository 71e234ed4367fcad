//! Configuration service implementation.
//!
//! Each process owns one `ConfigService`. The daemon and the web process load
//! the same store independently and only reconcile through a reload request.

use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};

use super::diff::ConfigDiff;
use super::settings::Settings;
use super::store::SettingsStore;
use crate::Result;

/// Cached settings plus the store they came from.
pub struct ConfigService {
    store: Arc<dyn SettingsStore>,
    current: RwLock<Arc<Settings>>,
    /// Store modification marker observed at the last load/reload/save.
    observed_mtime: Mutex<Option<SystemTime>>,
}

impl ConfigService {
    /// Create a service holding defaults until [`ConfigService::load`] runs.
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            current: RwLock::new(Arc::new(Settings::default())),
            observed_mtime: Mutex::new(None),
        }
    }

    /// Load the persisted settings, falling back to defaults if they are unusable.
    pub fn load(&self) -> Arc<Settings> {
        self.record_mtime();
        let settings = match self.store.load() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::error!(
                    "Failed to load settings from {}: {}; using defaults",
                    self.store.describe(),
                    e
                );
                Settings::default()
            }
        };

        log_settings(&settings);
        let settings = Arc::new(settings);
        *self.current.write() = settings.clone();
        settings
    }

    /// The settings currently in effect.
    pub fn current(&self) -> Arc<Settings> {
        self.current.read().clone()
    }

    /// Re-read the store and apply the result if it is valid.
    ///
    /// A broken record is logged and the previous settings stay in effect;
    /// the returned diff is then empty.
    pub fn reload(&self) -> ConfigDiff {
        self.record_mtime();
        let fresh = match self.store.load() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(
                    "Ignoring settings reload from {}: {}",
                    self.store.describe(),
                    e
                );
                return ConfigDiff::default();
            }
        };

        let mut current = self.current.write();
        let diff = ConfigDiff::between(&current, &fresh);
        if diff.is_empty() {
            tracing::debug!("Settings reloaded, nothing changed");
        } else {
            tracing::info!("Settings reloaded, changed: {}", diff.changed().join(", "));
            *current = Arc::new(fresh);
        }
        diff
    }

    /// Validate and persist new settings, then make them current in this process.
    pub fn save(&self, settings: Settings) -> Result<Arc<Settings>> {
        let settings = settings.normalized();
        settings.validate()?;
        self.store.save(&settings)?;
        self.record_mtime();

        let settings = Arc::new(settings);
        *self.current.write() = settings.clone();
        tracing::info!("Settings saved to {}", self.store.describe());
        Ok(settings)
    }

    /// Whether the store changed since it was last read or written here.
    pub fn changed_on_disk(&self) -> bool {
        let Some(now) = self.store.modified_at() else {
            return false;
        };
        *self.observed_mtime.lock() != Some(now)
    }

    pub fn is_read_only(&self) -> bool {
        self.store.is_read_only()
    }

    fn record_mtime(&self) {
        *self.observed_mtime.lock() = self.store.modified_at();
    }
}

fn log_settings(settings: &Settings) {
    tracing::info!(
        "Settings: interval={}m retention={}d temp=[{}, {}] volt_min={} endpoints={} notifications={}",
        settings.poll_interval_minutes,
        settings.retention_days,
        settings.temp_min,
        settings.temp_max,
        settings.volt_min,
        settings.endpoints.len(),
        if settings.notification_target.is_some() {
            "on"
        } else {
            "off"
        }
    );
}
