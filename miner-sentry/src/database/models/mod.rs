//! Database models for miner-sentry.
//!
//! These models map directly to the database schema.

pub mod miner;
pub mod reading;

pub use miner::*;
pub use reading::*;
