//! Polling cycle engine.

pub mod engine;

pub use engine::{DEFAULT_FETCH_CONCURRENCY, PollFailure, PollSummary, PollingEngine};
