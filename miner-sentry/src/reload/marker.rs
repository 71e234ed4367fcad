//! Process-identity marker: the daemon's PID written to a well-known file.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::utils::fs::write_atomic;
use crate::{Error, Result};

/// Read the PID stored in a marker file, if any.
pub fn read_pid(path: &Path) -> Option<u32> {
    let raw = std::fs::read_to_string(path).ok()?;
    raw.trim().parse().ok().filter(|pid| *pid > 0)
}

/// Whether a process with `pid` currently exists.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // Signal 0 performs the permission and existence checks only.
    let rc = unsafe { libc::kill(pid, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn process_alive(_pid: u32) -> bool {
    false
}

/// Owns the marker file for the lifetime of the daemon; removes it on drop.
#[derive(Debug)]
pub struct PidMarker {
    path: PathBuf,
    pid: u32,
}

impl PidMarker {
    /// Publish this process's PID at `path`.
    ///
    /// Fails if another live process already owns the marker; a stale marker
    /// is overwritten.
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let pid = std::process::id();

        if let Some(existing) = read_pid(&path)
            && existing != pid
        {
            if process_alive(existing) {
                return Err(Error::config(format!(
                    "another daemon (pid {existing}) owns {}",
                    path.display()
                )));
            }
            warn!(
                "Replacing stale process marker {} (pid {} is gone)",
                path.display(),
                existing
            );
        }

        write_atomic(&path, format!("{pid}\n").as_bytes())?;
        info!("Wrote process marker {} (pid {})", path.display(), pid);
        Ok(Self { path, pid })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Remove the marker now instead of at drop.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for PidMarker {
    fn drop(&mut self) {
        // Leave the file alone if another process has since taken it over.
        if read_pid(&self.path) != Some(self.pid) {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed process marker {}", self.path.display()),
            Err(e) => warn!(
                "Failed to remove process marker {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
