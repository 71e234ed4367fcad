//! miner-sentry library crate.
//!
//! Polls network-attached miners, stores their telemetry in SQLite and
//! raises edge-triggered alerts. The `miner-sentry` binary runs the polling
//! daemon; `miner-sentry-web` serves the dashboard API over the same
//! database.

pub mod alert;
pub mod api;
pub mod config;
pub mod database;
pub mod device;
pub mod error;
pub mod logging;
pub mod notification;
pub mod panic_hook;
pub mod poller;
pub mod reload;
pub mod scheduler;
pub mod services;
pub mod utils;

pub use error::{Error, Result};
