//! Broadcast and broadcast-platform database models.

use platform_adapters::Platform;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Broadcast database model.
///
/// Owned by the scheduling subsystem; the monitoring core reads LIVE
/// broadcasts and writes viewer aggregates only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BroadcastDbModel {
    pub id: String,
    pub title: String,
    /// Unix epoch milliseconds (UTC) the broadcast is scheduled to start.
    pub scheduled_start: i64,
    pub scheduled_end: Option<i64>,
    /// Lifecycle status (SCHEDULED, LIVE, ENDED, CANCELLED, ERROR).
    pub status: String,
    pub current_viewers: i64,
    pub peak_viewers: i64,
    /// Owning organisation.
    pub organisation_id: String,
    pub branch_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BroadcastDbModel {
    pub fn new(
        title: impl Into<String>,
        scheduled_start: i64,
        organisation_id: impl Into<String>,
    ) -> Self {
        let now = crate::database::time::now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            scheduled_start,
            scheduled_end: None,
            status: BroadcastStatus::Scheduled.as_str().to_string(),
            current_viewers: 0,
            peak_viewers: 0,
            organisation_id: organisation_id.into(),
            branch_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status == BroadcastStatus::Live.as_str()
    }
}

/// One row per (broadcast, external platform) pair.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BroadcastPlatformDbModel {
    pub id: String,
    pub broadcast_id: String,
    /// Platform identifier (ZOOM, FACEBOOK, INSTAGRAM).
    pub platform: String,
    /// Platform-assigned session id.
    pub external_id: Option<String>,
    pub stream_url: Option<String>,
    /// Connection status (PENDING, CONNECTED, LIVE, ENDED, ERROR).
    pub status: String,
    /// Last recorded error message.
    pub last_error: Option<String>,
    /// Consecutive failed health cycles.
    pub failure_count: i32,
    pub viewer_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BroadcastPlatformDbModel {
    pub fn new(broadcast_id: impl Into<String>, platform: Platform) -> Self {
        let now = crate::database::time::now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            broadcast_id: broadcast_id.into(),
            platform: platform.as_str().to_string(),
            external_id: None,
            stream_url: None,
            status: PlatformStatus::Pending.as_str().to_string(),
            last_error: None,
            failure_count: 0,
            viewer_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The typed platform identifier, if the stored text is recognized.
    pub fn platform(&self) -> Option<Platform> {
        Platform::parse(&self.platform)
    }

    /// The typed connection status, if the stored text is recognized.
    pub fn status(&self) -> Option<PlatformStatus> {
        PlatformStatus::parse(&self.status)
    }
}

/// Broadcast lifecycle states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastStatus {
    Scheduled,
    Live,
    Ended,
    Cancelled,
    Error,
}

impl BroadcastStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Live => "LIVE",
            Self::Ended => "ENDED",
            Self::Cancelled => "CANCELLED",
            Self::Error => "ERROR",
        }
    }
}

/// Platform connection states.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlatformStatus {
    /// Created, not yet connected to the platform.
    Pending,
    /// Connected and ready to broadcast.
    Connected,
    /// Actively broadcasting.
    Live,
    /// Broadcast ended.
    Ended,
    /// Degraded; health checks are failing.
    Error,
}

impl PlatformStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Connected => "CONNECTED",
            Self::Live => "LIVE",
            Self::Ended => "ENDED",
            Self::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "CONNECTED" => Some(Self::Connected),
            "LIVE" => Some(Self::Live),
            "ENDED" => Some(Self::Ended),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    /// Whether this status counts toward the broadcast health score.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Live | Self::Connected)
    }
}
