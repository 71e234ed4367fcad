//! Persistence for the settings record.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::settings::Settings;
use crate::utils::fs::{modified_at, write_atomic};
use crate::{Error, Result};

/// Loads and saves the flat settings record.
pub trait SettingsStore: Send + Sync {
    /// Read the persisted record, applying defaults for unset fields.
    fn load(&self) -> Result<Settings>;

    /// Persist a validated record.
    fn save(&self, settings: &Settings) -> Result<()>;

    /// Modification marker used by the periodic reload self-check.
    fn modified_at(&self) -> Option<SystemTime>;

    /// Whether [`SettingsStore::save`] is refused.
    fn is_read_only(&self) -> bool {
        false
    }

    /// Human-readable location for logs.
    fn describe(&self) -> String;
}

/// Settings kept as a JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<Settings> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Settings::from_json(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let defaults = Settings::default();
                tracing::info!(
                    "Settings file {} not found, writing defaults",
                    self.path.display()
                );
                self.save(&defaults)?;
                Ok(defaults)
            }
            Err(e) => Err(Error::io_path("reading", &self.path, e)),
        }
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        settings.validate()?;
        let json = serde_json::to_vec_pretty(settings)?;
        write_atomic(&self.path, &json)
    }

    fn modified_at(&self) -> Option<SystemTime> {
        modified_at(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Settings read from process environment variables; saving is refused.
#[derive(Debug, Clone, Default)]
pub struct EnvStore;

impl SettingsStore for EnvStore {
    fn load(&self) -> Result<Settings> {
        Settings::from_env_vars(|key| std::env::var(key).ok())
    }

    fn save(&self, _settings: &Settings) -> Result<()> {
        Err(Error::config(
            "settings are managed through environment variables and cannot be saved",
        ))
    }

    fn modified_at(&self) -> Option<SystemTime> {
        None
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        "environment".to_string()
    }
}
