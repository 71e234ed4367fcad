//! Reading history routes.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::{Duration, Utc};

use crate::api::error::ApiResult;
use crate::api::models::{DEFAULT_READINGS_HOURS, MinerReadings, ReadingsQuery, ReadingsResponse};
use crate::api::server::AppState;
use crate::database::models::ReadingDbModel;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_readings))
}

/// Clamp the requested window to `1..=24 * retention_days` hours.
pub fn effective_hours(requested: Option<u32>, retention_days: u32) -> u32 {
    let max = retention_days.saturating_mul(24).max(1);
    requested.unwrap_or(DEFAULT_READINGS_HOURS).clamp(1, max)
}

async fn list_readings(
    State(state): State<AppState>,
    Query(query): Query<ReadingsQuery>,
) -> ApiResult<Json<ReadingsResponse>> {
    let hours = effective_hours(query.hours, state.config.current().retention_days);
    let cutoff = Utc::now() - Duration::hours(i64::from(hours));

    let miners = match query.miner_id {
        Some(id) => vec![state.repo.get_miner(id).await?],
        None => state.repo.list_miners().await?,
    };

    let mut by_miner: HashMap<i64, Vec<ReadingDbModel>> = HashMap::new();
    for reading in state.repo.readings_since(cutoff, query.miner_id).await? {
        by_miner.entry(reading.miner_id).or_default().push(reading);
    }

    let miners = miners
        .into_iter()
        .map(|m| MinerReadings {
            readings: by_miner.remove(&m.id).unwrap_or_default(),
            miner_id: m.id,
            name: m.name,
            endpoint: m.endpoint,
        })
        .collect();

    Ok(Json(ReadingsResponse { hours, miners }))
}
