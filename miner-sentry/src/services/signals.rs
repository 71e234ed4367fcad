//! Process termination signals.
//!
//! Handlers are registered up front so a signal delivered before the caller
//! starts waiting is queued instead of taking the default action.

use tracing::info;

/// Ctrl-C and, on Unix, SIGTERM.
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    /// Install the handlers. Must be called inside the runtime.
    #[cfg(unix)]
    pub fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Resolve once a termination signal has been received.
    #[cfg(unix)]
    pub async fn recv(&mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => info!("Received Ctrl-C"),
            _ = self.terminate.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C"),
            Err(e) => {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}
