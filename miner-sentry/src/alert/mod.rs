//! Alert policy and dedup tracking.

pub mod policy;
pub mod tracker;

pub use policy::{AlertIntent, AlertKind, MinerAlertState, Thresholds};
pub use tracker::AlertTracker;
