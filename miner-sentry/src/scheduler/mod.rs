//! Scheduling of polling cycles and retention cleanup.

pub mod service;

pub use service::{Scheduler, SchedulerCommand, SchedulerHandle};
