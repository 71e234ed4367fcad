//! Device access: fetching a miner's current telemetry.

pub mod client;
pub mod telemetry;

pub use client::{
    DEFAULT_FETCH_TIMEOUT, DeviceClient, DeviceFailure, FailureKind, FetchOutcome,
    HttpDeviceClient,
};
pub use telemetry::Telemetry;
