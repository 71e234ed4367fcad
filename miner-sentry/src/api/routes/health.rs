//! Health check routes.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::models::HealthResponse;
use crate::api::server::AppState;
use crate::reload::{process_alive, read_pid};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let daemon_running = read_pid(&state.pid_file).is_some_and(process_alive);

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        daemon_running,
    })
}
