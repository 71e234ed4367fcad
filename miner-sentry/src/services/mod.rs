//! Service layer module.
//!
//! This module provides the service container, the daemon context and
//! shutdown signal handling shared by both binaries.

pub mod container;
pub mod daemon;
pub mod signals;

pub use container::ServiceContainer;
pub use daemon::DaemonContext;
pub use signals::ShutdownSignals;
