//! REST API served by the web process.
//!
//! Exposes miners, reading history, settings and manual polling to the
//! dashboard.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{ApiServer, ApiServerConfig, AppState, build_router};
