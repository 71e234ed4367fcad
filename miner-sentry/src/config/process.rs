//! Process-level environment: where data, logs and the marker file live.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use super::store::{EnvStore, JsonFileStore, SettingsStore};
use crate::database::sqlite_url;
use crate::{Error, Result};

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_WEB_ADDR: &str = "0.0.0.0:8080";
pub const SETTINGS_FILE_NAME: &str = "config.json";
pub const DATABASE_FILE_NAME: &str = "miner_sentry.db";
pub const PID_FILE_NAME: &str = "miner-sentry.pid";

/// Paths and addresses resolved from `SENTRY_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    pub data_dir: PathBuf,
    pub database_url: String,
    pub log_dir: PathBuf,
    pub pid_file: PathBuf,
    pub settings_file: PathBuf,
    pub web_addr: SocketAddr,
    /// Read settings from environment variables instead of the JSON file.
    pub settings_from_env: bool,
}

impl ProcessConfig {
    /// Resolve from the real process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` for variable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = PathBuf::from(get("SENTRY_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()));
        let database_url = get("DATABASE_URL")
            .unwrap_or_else(|| sqlite_url(&data_dir.join(DATABASE_FILE_NAME)));
        let log_dir = get("SENTRY_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("logs"));
        let pid_file = get("SENTRY_PID_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(PID_FILE_NAME));
        let settings_file = data_dir.join(SETTINGS_FILE_NAME);

        let web_addr_raw = get("SENTRY_WEB_ADDR").unwrap_or_else(|| DEFAULT_WEB_ADDR.to_string());
        let web_addr = web_addr_raw
            .parse()
            .map_err(|e| Error::config(format!("SENTRY_WEB_ADDR '{web_addr_raw}': {e}")))?;

        let settings_from_env = get("SENTRY_SETTINGS_FROM_ENV")
            .is_some_and(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no"));

        Ok(Self {
            data_dir,
            database_url,
            log_dir,
            pid_file,
            settings_file,
            web_addr,
            settings_from_env,
        })
    }

    /// The settings store selected by this configuration.
    pub fn settings_store(&self) -> Arc<dyn SettingsStore> {
        if self.settings_from_env {
            Arc::new(EnvStore)
        } else {
            Arc::new(JsonFileStore::new(&self.settings_file))
        }
    }
}
