//! Miner routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get},
};

use crate::api::error::ApiResult;
use crate::api::models::{DeleteMinerResponse, MinerListResponse, MinerStatus};
use crate::api::server::AppState;
use crate::database::time::now_ms;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_miners))
        .route("/{id}", delete(delete_miner))
}

/// All known miners, each with its latest reading.
async fn list_miners(State(state): State<AppState>) -> ApiResult<Json<MinerListResponse>> {
    let now = now_ms();
    let mut miners = Vec::new();

    for miner in state.repo.list_miners().await? {
        let latest = state.repo.latest_reading(miner.id).await?;
        let minutes_ago = latest
            .as_ref()
            .map(|r| (now - r.timestamp).max(0) / 60_000);
        miners.push(MinerStatus {
            miner,
            latest,
            minutes_ago,
        });
    }

    Ok(Json(MinerListResponse { miners }))
}

/// Remove a miner and, by cascade, its readings.
///
/// A miner still listed in the settings is re-created on the next poll.
async fn delete_miner(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DeleteMinerResponse>> {
    state.repo.delete_miner(id).await?;
    Ok(Json(DeleteMinerResponse {
        success: true,
        deleted: id,
    }))
}
