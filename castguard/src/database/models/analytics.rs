//! Append-only analytics rows.

use platform_adapters::Platform;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One health check outcome, keyed (broadcast, platform, timestamp).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct HealthRecordDbModel {
    pub id: String,
    pub broadcast_id: String,
    pub platform_id: String,
    pub platform: String,
    pub healthy: bool,
    pub latency_ms: i64,
    pub error: Option<String>,
    pub checked_at: i64,
}

impl HealthRecordDbModel {
    pub fn new(
        broadcast_id: impl Into<String>,
        platform_id: impl Into<String>,
        platform: Platform,
        healthy: bool,
        latency_ms: i64,
        error: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            broadcast_id: broadcast_id.into(),
            platform_id: platform_id.into(),
            platform: platform.as_str().to_string(),
            healthy,
            latency_ms,
            error,
            checked_at: crate::database::time::now_ms(),
        }
    }
}

/// One quality sample with its computed score.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QualityRecordDbModel {
    pub id: String,
    pub broadcast_id: String,
    pub platform_id: String,
    pub platform: String,
    pub bitrate_kbps: f64,
    pub fps: f64,
    pub resolution: String,
    pub dropped_frames: i64,
    pub buffer_health_pct: f64,
    pub latency_ms: f64,
    pub jitter_ms: f64,
    pub packet_loss_pct: f64,
    pub score: f64,
    pub checked_at: i64,
}

/// Best-effort alert dispatch history marker.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AlertRecordDbModel {
    pub id: String,
    pub alert_type: String,
    pub severity: String,
    pub title: String,
    pub broadcast_id: String,
    pub platform: Option<String>,
    pub created_at: i64,
}
