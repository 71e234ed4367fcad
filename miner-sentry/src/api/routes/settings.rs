//! Settings routes.
//!
//! Saving writes the settings file and then asks the daemon to reload.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{SaveSettingsResponse, SettingsResponse};
use crate::api::server::AppState;
use crate::config::Settings;
use crate::reload::request_reload;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_settings).put(update_settings))
}

async fn get_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    state.config.reload();
    Json(SettingsResponse {
        settings: (*state.config.current()).clone(),
        read_only: state.config.is_read_only(),
    })
}

async fn update_settings(
    State(state): State<AppState>,
    Json(settings): Json<Settings>,
) -> ApiResult<Json<SaveSettingsResponse>> {
    if state.config.is_read_only() {
        return Err(ApiError::forbidden(
            "settings are provided by the environment and cannot be changed here",
        ));
    }

    let saved = state.config.save(settings)?;
    let reload = request_reload(&state.pid_file);
    tracing::info!("Settings saved, daemon reload: {:?}", reload);

    Ok(Json(SaveSettingsResponse {
        success: true,
        saved: true,
        reload,
        settings: (*saved).clone(),
    }))
}
