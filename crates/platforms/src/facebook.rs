//! Facebook Live adapter (Graph API live-videos).

use async_trait::async_trait;
use resilient_client::{CallSpec, ClientConfig, ClientError, ResilientClient};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::adapter::{PlatformAdapter, PlatformSession, SessionSpec, SessionState};
use crate::credentials::{CredentialSource, TokenCache};
use crate::error::AdapterError;
use crate::platform::Platform;

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v19.0";

/// Adapter for Facebook Live videos.
pub struct FacebookAdapter {
    client: ResilientClient,
    tokens: TokenCache,
    /// Page the live videos are published on.
    page_id: String,
}

#[derive(Debug, Deserialize)]
struct LiveVideo {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    permalink_url: Option<String>,
    #[serde(default)]
    stream_url: Option<String>,
    #[serde(default)]
    live_views: Option<u64>,
}

fn map_status(status: &str) -> Result<SessionState, AdapterError> {
    match status {
        "UNPUBLISHED" | "SCHEDULED_UNPUBLISHED" => Ok(SessionState::Waiting),
        "LIVE" => Ok(SessionState::Live),
        "LIVE_STOPPED" | "VOD" => Ok(SessionState::Ended),
        other => Err(AdapterError::payload(
            Platform::Facebook,
            format!("unknown live video status '{other}'"),
        )),
    }
}

impl FacebookAdapter {
    pub fn new(config: ClientConfig, source: Box<dyn CredentialSource>, page_id: String) -> Self {
        Self::with_client(
            ResilientClient::new("facebook", GRAPH_API_BASE, config),
            source,
            page_id,
        )
    }

    pub fn with_client(
        client: ResilientClient,
        source: Box<dyn CredentialSource>,
        page_id: String,
    ) -> Self {
        Self {
            client,
            tokens: TokenCache::new(Platform::Facebook, source),
            page_id,
        }
    }

    /// Graph API carries the token as a query parameter.
    async fn authed(&self, spec: CallSpec) -> Result<CallSpec, AdapterError> {
        let token = self.tokens.bearer().await?;
        Ok(spec.query("access_token", token))
    }

    fn session_from(&self, video: LiveVideo) -> Result<PlatformSession, AdapterError> {
        let status = video.status.as_deref().unwrap_or("UNPUBLISHED");
        Ok(PlatformSession {
            external_id: video.id,
            join_url: video.permalink_url,
            stream_url: video.stream_url,
            state: map_status(status)?,
            viewer_count: video.live_views,
        })
    }
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn platform(&self) -> Platform {
        Platform::Facebook
    }

    async fn create_session(&self, spec: &SessionSpec) -> Result<PlatformSession, AdapterError> {
        let call = self
            .authed(
                CallSpec::post(format!("/{}/live_videos", self.page_id)).json(json!({
                    "title": spec.title,
                    "status": "UNPUBLISHED",
                    "planned_start_time": spec.scheduled_start.timestamp(),
                })),
            )
            .await?;

        let response = self.client.request(call).await?;
        let video: LiveVideo = response
            .json()
            .map_err(|e| AdapterError::payload(Platform::Facebook, e.to_string()))?;
        debug!(video_id = %video.id, "created facebook live video");
        self.session_from(video)
    }

    async fn get_session(
        &self,
        external_id: &str,
    ) -> Result<Option<PlatformSession>, AdapterError> {
        let call = self
            .authed(
                CallSpec::get(format!("/{external_id}"))
                    .query("fields", "status,permalink_url,stream_url,live_views"),
            )
            .await?;

        match self.client.request(call).await {
            Ok(response) => {
                let video: LiveVideo = response
                    .json()
                    .map_err(|e| AdapterError::payload(Platform::Facebook, e.to_string()))?;
                Ok(Some(self.session_from(video)?))
            }
            Err(ClientError::Status { status: 404, .. }) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn start_session(&self, external_id: &str) -> Result<(), AdapterError> {
        let call = self
            .authed(CallSpec::post(format!("/{external_id}")).json(json!({"status": "LIVE_NOW"})))
            .await?;
        self.client.request(call).await?;
        Ok(())
    }

    async fn end_session(&self, external_id: &str) -> Result<(), AdapterError> {
        let call = self
            .authed(
                CallSpec::post(format!("/{external_id}")).json(json!({"end_live_video": true})),
            )
            .await?;
        self.client.request(call).await?;
        Ok(())
    }

    async fn viewer_count(&self, external_id: &str) -> Result<u64, AdapterError> {
        let call = self
            .authed(CallSpec::get(format!("/{external_id}")).query("fields", "live_views"))
            .await?;
        let response = self.client.request(call).await?;
        let video: LiveVideo = response
            .json()
            .map_err(|e| AdapterError::payload(Platform::Facebook, e.to_string()))?;
        Ok(video.live_views.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::credentials::StaticCredentialSource;
    use crate::test_support::{ScriptedTransport, response};

    fn adapter(transport: std::sync::Arc<ScriptedTransport>) -> FacebookAdapter {
        let config = ClientConfig {
            min_interval_ms: 0,
            max_retries: 0,
            ..Default::default()
        };
        let client = ResilientClient::with_transport(
            "facebook",
            "https://graph.facebook.com/v19.0",
            config,
            transport,
        );
        FacebookAdapter::with_client(
            client,
            Box::new(StaticCredentialSource::new("fb-token")),
            "page-1".into(),
        )
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_status("UNPUBLISHED").unwrap(), SessionState::Waiting);
        assert_eq!(map_status("LIVE").unwrap(), SessionState::Live);
        assert_eq!(map_status("LIVE_STOPPED").unwrap(), SessionState::Ended);
        assert_eq!(map_status("VOD").unwrap(), SessionState::Ended);
        assert!(map_status("PROCESSING").is_err());
    }

    #[tokio::test]
    async fn test_get_session_carries_token_in_query() {
        let transport = ScriptedTransport::new(vec![response(
            200,
            json!({"id": "99", "status": "LIVE", "live_views": 250}),
        )]);
        let adapter = adapter(transport.clone());

        let session = adapter.get_session("99").await.unwrap().unwrap();
        assert_eq!(session.state, SessionState::Live);
        assert_eq!(session.viewer_count, Some(250));

        let seen = transport.seen.lock();
        assert!(
            seen[0]
                .query
                .iter()
                .any(|(k, v)| k == "access_token" && v == "fb-token")
        );
    }

    #[tokio::test]
    async fn test_missing_video_is_none() {
        let transport = ScriptedTransport::new(vec![response(
            404,
            json!({"error": {"message": "Unsupported get request"}}),
        )]);
        let adapter = adapter(transport);

        assert!(adapter.get_session("gone").await.unwrap().is_none());
    }
}
