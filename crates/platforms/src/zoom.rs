//! Zoom meetings adapter.

use async_trait::async_trait;
use resilient_client::{CallSpec, ClientConfig, ClientError, ResilientClient};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::adapter::{PlatformAdapter, PlatformSession, SessionSpec, SessionState};
use crate::credentials::{CredentialSource, TokenCache};
use crate::error::AdapterError;
use crate::platform::Platform;

const ZOOM_API_BASE: &str = "https://api.zoom.us";

/// Adapter for Zoom meetings.
pub struct ZoomAdapter {
    client: ResilientClient,
    tokens: TokenCache,
    /// User whose account hosts created meetings.
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct ZoomMeeting {
    id: u64,
    status: String,
    #[serde(default)]
    join_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ZoomParticipants {
    total_records: u64,
}

fn map_status(status: &str) -> Result<SessionState, AdapterError> {
    match status {
        "waiting" => Ok(SessionState::Waiting),
        "started" => Ok(SessionState::Live),
        "finished" => Ok(SessionState::Ended),
        other => Err(AdapterError::payload(
            Platform::Zoom,
            format!("unknown meeting status '{other}'"),
        )),
    }
}

impl ZoomAdapter {
    pub fn new(config: ClientConfig, source: Box<dyn CredentialSource>, user_id: String) -> Self {
        Self::with_client(
            ResilientClient::new("zoom", ZOOM_API_BASE, config),
            source,
            user_id,
        )
    }

    /// Build around an existing client, for tests and custom transports.
    pub fn with_client(
        client: ResilientClient,
        source: Box<dyn CredentialSource>,
        user_id: String,
    ) -> Self {
        Self {
            client,
            tokens: TokenCache::new(Platform::Zoom, source),
            user_id,
        }
    }

    async fn authed(&self, spec: CallSpec) -> Result<CallSpec, AdapterError> {
        let token = self.tokens.bearer().await?;
        Ok(spec.header("authorization", format!("Bearer {token}")))
    }

    fn session_from(&self, meeting: ZoomMeeting) -> Result<PlatformSession, AdapterError> {
        Ok(PlatformSession {
            external_id: meeting.id.to_string(),
            join_url: meeting.join_url,
            stream_url: None,
            state: map_status(&meeting.status)?,
            viewer_count: None,
        })
    }
}

#[async_trait]
impl PlatformAdapter for ZoomAdapter {
    fn platform(&self) -> Platform {
        Platform::Zoom
    }

    async fn create_session(&self, spec: &SessionSpec) -> Result<PlatformSession, AdapterError> {
        let call = self
            .authed(
                CallSpec::post(format!("/v2/users/{}/meetings", self.user_id)).json(json!({
                    "topic": spec.title,
                    "type": 2,
                    "start_time": spec.scheduled_start.to_rfc3339(),
                    "duration": spec.duration_minutes,
                })),
            )
            .await?;

        let response = self.client.request(call).await?;
        let meeting: ZoomMeeting = response
            .json()
            .map_err(|e| AdapterError::payload(Platform::Zoom, e.to_string()))?;
        debug!(meeting_id = meeting.id, "created zoom meeting");
        self.session_from(meeting)
    }

    async fn get_session(
        &self,
        external_id: &str,
    ) -> Result<Option<PlatformSession>, AdapterError> {
        let call = self
            .authed(CallSpec::get(format!("/v2/meetings/{external_id}")))
            .await?;

        match self.client.request(call).await {
            Ok(response) => {
                let meeting: ZoomMeeting = response
                    .json()
                    .map_err(|e| AdapterError::payload(Platform::Zoom, e.to_string()))?;
                Ok(Some(self.session_from(meeting)?))
            }
            Err(ClientError::Status { status: 404, .. }) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn start_session(&self, external_id: &str) -> Result<(), AdapterError> {
        let call = self
            .authed(
                CallSpec::patch(format!("/v2/meetings/{external_id}/status"))
                    .json(json!({"action": "start"})),
            )
            .await?;
        self.client.request(call).await?;
        Ok(())
    }

    async fn end_session(&self, external_id: &str) -> Result<(), AdapterError> {
        let call = self
            .authed(
                CallSpec::patch(format!("/v2/meetings/{external_id}/status"))
                    .json(json!({"action": "end"})),
            )
            .await?;
        self.client.request(call).await?;
        Ok(())
    }

    async fn viewer_count(&self, external_id: &str) -> Result<u64, AdapterError> {
        let call = self
            .authed(CallSpec::get(format!(
                "/v2/metrics/meetings/{external_id}/participants"
            )))
            .await?;
        let response = self.client.request(call).await?;
        let participants: ZoomParticipants = response
            .json()
            .map_err(|e| AdapterError::payload(Platform::Zoom, e.to_string()))?;
        Ok(participants.total_records)
    }
}
