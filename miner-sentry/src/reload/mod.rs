//! Cross-process reload coordination.
//!
//! The daemon publishes its PID in a marker file. The web process reads it
//! and sends SIGHUP; the daemon also polls the settings file's modification
//! time so a missed signal is picked up within one check period.

pub mod marker;
pub mod request;
pub mod sources;

pub use marker::{PidMarker, process_alive, read_pid};
pub use request::{ReloadRequest, request_reload};
pub use sources::{ReloadSignal, SETTINGS_CHECK_INTERVAL, spawn_settings_watcher};
