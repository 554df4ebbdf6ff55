//! The adapter trait and its session types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::platform::Platform;

/// What to create a broadcast session from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSpec {
    /// Human-facing session title.
    pub title: String,
    /// Scheduled start time.
    pub scheduled_start: DateTime<Utc>,
    /// Planned duration in minutes, where the platform wants one.
    pub duration_minutes: Option<u32>,
}

/// Lifecycle state of a session as the platform reports it.
///
/// Kept separate from "session not found" so callers can tell a broadcast
/// that ended from one that vanished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Created but not yet broadcasting.
    Waiting,
    /// Currently broadcasting.
    Live,
    /// Broadcast finished on the platform side.
    Ended,
}

impl SessionState {
    /// Whether a health check should treat this state as alive.
    pub fn is_alive(&self) -> bool {
        matches!(self, Self::Waiting | Self::Live)
    }
}

/// A session as known to the external platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSession {
    /// Platform-assigned identifier.
    pub external_id: String,
    /// URL participants join through.
    pub join_url: Option<String>,
    /// Ingest / playback stream URL, if the platform exposes one.
    pub stream_url: Option<String>,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Current viewer count, if the platform reports it on the session.
    pub viewer_count: Option<u64>,
}

/// Operations the monitoring core needs from every streaming platform.
///
/// Implementations route all network traffic through one adapter-scoped
/// [`resilient_client::ResilientClient`] and must obtain a valid credential
/// before each call, surfacing [`AdapterError::ReauthorizationRequired`] when
/// refresh fails rather than inventing a token.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// The platform this adapter talks to.
    fn platform(&self) -> Platform;

    /// Create a new session on the platform.
    async fn create_session(&self, spec: &SessionSpec) -> Result<PlatformSession, AdapterError>;

    /// Look a session up by its platform-assigned id.
    ///
    /// Returns `Ok(None)` when the platform does not know the id.
    async fn get_session(&self, external_id: &str)
    -> Result<Option<PlatformSession>, AdapterError>;

    /// Start broadcasting on an existing session.
    async fn start_session(&self, external_id: &str) -> Result<(), AdapterError>;

    /// End an ongoing session.
    async fn end_session(&self, external_id: &str) -> Result<(), AdapterError>;

    /// Current viewer count for a session.
    async fn viewer_count(&self, external_id: &str) -> Result<u64, AdapterError>;
}
