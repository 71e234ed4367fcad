//! API request and response models (DTOs).
//!
//! Readings are returned as stored; these types only add grouping and the
//! `success` flags the dashboard relies on.

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::database::models::{MinerDbModel, ReadingDbModel};
use crate::poller::PollFailure;
use crate::reload::ReloadRequest;

/// Default look-back for `GET /api/readings`.
pub const DEFAULT_READINGS_HOURS: u32 = 24;

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Whether a daemon currently owns the PID marker.
    pub daemon_running: bool,
}

// ============================================================================
// Miners
// ============================================================================

/// A miner with its most recent reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerStatus {
    #[serde(flatten)]
    pub miner: MinerDbModel,
    pub latest: Option<ReadingDbModel>,
    /// Whole minutes since `latest` was captured.
    pub minutes_ago: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerListResponse {
    pub miners: Vec<MinerStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteMinerResponse {
    pub success: bool,
    pub deleted: i64,
}

// ============================================================================
// Readings
// ============================================================================

/// Query parameters for `GET /api/readings`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadingsQuery {
    pub miner_id: Option<i64>,
    pub hours: Option<u32>,
}

/// Readings of one miner, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerReadings {
    pub miner_id: i64,
    pub name: String,
    pub endpoint: String,
    pub readings: Vec<ReadingDbModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingsResponse {
    /// Effective window after clamping.
    pub hours: u32,
    pub miners: Vec<MinerReadings>,
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SettingsResponse {
    pub settings: Settings,
    /// Settings come from the environment and cannot be edited.
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveSettingsResponse {
    pub success: bool,
    pub saved: bool,
    pub reload: ReloadRequest,
    pub settings: Settings,
}

// ============================================================================
// Poll
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PollResponse {
    pub success: bool,
    /// Endpoints whose reading was stored.
    pub polled: usize,
    pub total: usize,
    pub failures: Vec<PollFailure>,
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestNotificationRequest {
    /// Webhook to test instead of the configured one.
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
