//! Asking a running daemon to reload its settings.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::marker::{process_alive, read_pid};

/// Outcome of a reload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadRequest {
    /// The daemon was signalled.
    Signalled,
    /// No live daemon owns the marker (absent or stale).
    DaemonNotRunning,
    /// Signals are unavailable; the daemon's settings watcher will notice the change.
    Deferred,
}

/// Send a reload request to the daemon published at `pid_file`.
///
/// A missing or stale marker is reported, never treated as an error.
pub fn request_reload(pid_file: &Path) -> ReloadRequest {
    let Some(pid) = read_pid(pid_file) else {
        debug!("No daemon marker at {}", pid_file.display());
        return ReloadRequest::DaemonNotRunning;
    };

    if !process_alive(pid) {
        if cfg!(unix) {
            info!("Daemon marker {} is stale (pid {})", pid_file.display(), pid);
            return ReloadRequest::DaemonNotRunning;
        }
        return ReloadRequest::Deferred;
    }

    send_hangup(pid)
}

#[cfg(unix)]
fn send_hangup(pid: u32) -> ReloadRequest {
    let Ok(raw) = libc::pid_t::try_from(pid) else {
        return ReloadRequest::DaemonNotRunning;
    };
    let rc = unsafe { libc::kill(raw, libc::SIGHUP) };
    if rc == 0 {
        info!("Sent reload signal to daemon (pid {})", pid);
        ReloadRequest::Signalled
    } else {
        warn!(
            "Failed to signal daemon (pid {}): {}",
            pid,
            std::io::Error::last_os_error()
        );
        ReloadRequest::DaemonNotRunning
    }
}

#[cfg(not(unix))]
fn send_hangup(_pid: u32) -> ReloadRequest {
    ReloadRequest::Deferred
}
