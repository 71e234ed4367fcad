//! Manual poll route.

use axum::{Json, Router, extract::State, routing::post};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::PollResponse;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(poll_now))
}

/// Run one cycle in this process. Failing endpoints are reported, not errors.
async fn poll_now(State(state): State<AppState>) -> ApiResult<Json<PollResponse>> {
    state.config.reload();
    let summary = state.engine.run_cycle().await;
    if summary.skipped {
        return Err(ApiError::conflict("A poll is already in progress"));
    }

    Ok(Json(PollResponse {
        success: true,
        polled: summary.succeeded,
        total: summary.total,
        failures: summary.failures,
    }))
}
