//! API route modules.
//!
//! Organizes routes by resource type.

pub mod health;
pub mod miners;
pub mod notifications;
pub mod poll;
pub mod readings;
pub mod settings;

use axum::Router;

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/health", health::router())
        .nest("/api/miners", miners::router())
        .nest("/api/readings", readings::router())
        .nest("/api/settings", settings::router())
        .nest("/api/poll", poll::router())
        .nest("/api/notifications", notifications::router())
        .with_state(state)
}
