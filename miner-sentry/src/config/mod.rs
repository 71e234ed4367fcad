//! Configuration module.
//!
//! The settings record, where it is persisted, and the per-process service
//! that loads it and detects changes on reload.

pub mod diff;
pub mod process;
pub mod service;
pub mod settings;
pub mod store;

pub use diff::ConfigDiff;
pub use process::ProcessConfig;
pub use service::ConfigService;
pub use settings::Settings;
pub use store::{EnvStore, JsonFileStore, SettingsStore};
