//! Instagram Live adapter (Graph API live-media).

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

/// Adapter for Instagram Live media.
pub struct InstagramAdapter {
    client: ResilientClient,
    tokens: TokenCache,
    /// Instagram professional account the live media belongs to.
    account_id: String,
}

#[derive(Debug, Deserialize)]
struct LiveMedia {
    id: String,
    #[serde(default)]
    broadcast_status: Option<String>,
    #[serde(default)]
    stream_url: Option<String>,
    #[serde(default)]
    viewer_count: Option<u64>,
}

fn map_status(status: &str) -> Result<SessionState, AdapterError> {
    match status {
        "UNPUBLISHED" => Ok(SessionState::Waiting),
        "ACTIVE" => Ok(SessionState::Live),
        "STOPPED" => Ok(SessionState::Ended),
        other => Err(AdapterError::payload(
            Platform::Instagram,
            format!("unknown broadcast status '{other}'"),
        )),
    }
}

impl InstagramAdapter {
    pub fn new(
        config: ClientConfig,
        source: Box<dyn CredentialSource>,
        account_id: String,
    ) -> Self {
        Self::with_client(
            ResilientClient::new("instagram", GRAPH_API_BASE, config),
            source,
            account_id,
        )
    }

    pub fn with_client(
        client: ResilientClient,
        source: Box<dyn CredentialSource>,
        account_id: String,
    ) -> Self {
        Self {
            client,
            tokens: TokenCache::new(Platform::Instagram, source),
            account_id,
        }
    }

    async fn authed(&self, spec: CallSpec) -> Result<CallSpec, AdapterError> {
        let token = self.tokens.bearer().await?;
        Ok(spec.query("access_token", token))
    }

    fn session_from(&self, media: LiveMedia) -> Result<PlatformSession, AdapterError> {
        let status = media.broadcast_status.as_deref().unwrap_or("UNPUBLISHED");
        Ok(PlatformSession {
            external_id: media.id,
            join_url: None,
            stream_url: media.stream_url,
            state: map_status(status)?,
            viewer_count: media.viewer_count,
        })
    }
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn create_session(&self, spec: &SessionSpec) -> Result<PlatformSession, AdapterError> {
        let call = self
            .authed(
                CallSpec::post(format!("/{}/live_media", self.account_id))
                    .json(json!({"title": spec.title})),
            )
            .await?;

        let response = self.client.request(call).await?;
        let media: LiveMedia = response
            .json()
            .map_err(|e| AdapterError::payload(Platform::Instagram, e.to_string()))?;
        debug!(media_id = %media.id, "created instagram live media");
        self.session_from(media)
    }

    async fn get_session(
        &self,
        external_id: &str,
    ) -> Result<Option<PlatformSession>, AdapterError> {
        let call = self
            .authed(
                CallSpec::get(format!("/{external_id}"))
                    .query("fields", "broadcast_status,stream_url,viewer_count"),
            )
            .await?;

        match self.client.request(call).await {
            Ok(response) => {
                let media: LiveMedia = response
                    .json()
                    .map_err(|e| AdapterError::payload(Platform::Instagram, e.to_string()))?;
                Ok(Some(self.session_from(media)?))
            }
            Err(ClientError::Status { status: 404, .. }) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn start_session(&self, external_id: &str) -> Result<(), AdapterError> {
        let call = self
            .authed(
                CallSpec::post(format!("/{external_id}")).json(json!({"broadcast_status": "ACTIVE"})),
            )
            .await?;
        self.client.request(call).await?;
        Ok(())
    }

    async fn end_session(&self, external_id: &str) -> Result<(), AdapterError> {
        let call = self
            .authed(
                CallSpec::post(format!("/{external_id}"))
                    .json(json!({"broadcast_status": "STOPPED"})),
            )
            .await?;
        self.client.request(call).await?;
        Ok(())
    }

    async fn viewer_count(&self, external_id: &str) -> Result<u64, AdapterError> {
        let call = self
            .authed(CallSpec::get(format!("/{external_id}")).query("fields", "viewer_count"))
            .await?;
        let response = self.client.request(call).await?;
        let media: LiveMedia = response
            .json()
            .map_err(|e| AdapterError::payload(Platform::Instagram, e.to_string()))?;
        Ok(media.viewer_count.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::credentials::StaticCredentialSource;
    use crate::test_support::{ScriptedTransport, response};

    fn adapter(transport: std::sync::Arc<ScriptedTransport>) -> InstagramAdapter {
        let config = ClientConfig {
            min_interval_ms: 0,
            max_retries: 0,
            ..Default::default()
        };
        let client = ResilientClient::with_transport(
            "instagram",
            "https://graph.facebook.com/v19.0",
            config,
            transport,
        );
        InstagramAdapter::with_client(
            client,
            Box::new(StaticCredentialSource::new("ig-token")),
            "ig-1".into(),
        )
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(map_status("UNPUBLISHED").unwrap(), SessionState::Waiting);
        assert_eq!(map_status("ACTIVE").unwrap(), SessionState::Live);
        assert_eq!(map_status("STOPPED").unwrap(), SessionState::Ended);
        assert!(map_status("ARCHIVED").is_err());
    }

    #[tokio::test]
    async fn test_stopped_broadcast_maps_to_ended() {
        let transport = ScriptedTransport::new(vec![response(
            200,
            json!({"id": "55", "broadcast_status": "STOPPED"}),
        )]);
        let adapter = adapter(transport);

        let session = adapter.get_session("55").await.unwrap().unwrap();
        assert_eq!(session.state, SessionState::Ended);
    }

    #[tokio::test]
    async fn test_missing_media_is_none() {
        let transport = ScriptedTransport::new(vec![response(404, json!({"error": {}}))]);
        let adapter = adapter(transport);

        assert!(adapter.get_session("gone").await.unwrap().is_none());
    }
}
