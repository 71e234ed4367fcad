//! Notification routes.

use axum::{Json, Router, body::Bytes, extract::State, routing::post};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{SuccessResponse, TestNotificationRequest};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/test", post(send_test))
}

/// The body is optional; without one the configured webhook is tested.
async fn send_test(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<SuccessResponse>> {
    let request: TestNotificationRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TestNotificationRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid request body: {e}")))?
    };

    state
        .notifications
        .send_test(request.target.as_deref())
        .await?;
    Ok(Json(SuccessResponse::ok("Test notification sent")))
}
