//! Miner database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A mining device, identified by its normalized endpoint.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct MinerDbModel {
    pub id: i64,
    pub name: String,
    /// Normalized endpoint URI (always carries a scheme). Unique.
    pub endpoint: String,
    /// Unix epoch milliseconds of first sighting.
    pub added_at: i64,
}
