//! Timer-driven monitoring loops.

pub mod health;
pub mod quality;

use std::collections::HashMap;
use std::sync::Arc;

use platform_adapters::{Platform, PlatformAdapter};

/// Adapter lookup by platform, shared by both monitors.
pub type AdapterMap = HashMap<Platform, Arc<dyn PlatformAdapter>>;

#[cfg(test)]
pub(crate) mod test_support {
    //! In-memory doubles for the monitor tests.

    use std::collections::VecDeque;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use platform_adapters::{
        AdapterError, Platform, PlatformAdapter, PlatformSession, SessionSpec, SessionState,
    };

    use crate::alert::{AlertDispatcher, LogNotifier, OwnerContacts, StaticContactResolver};
    use crate::database::models::{
        AlertRecordDbModel, BroadcastDbModel, BroadcastPlatformDbModel, BroadcastStatus,
        HealthRecordDbModel, PlatformStatus, QualityRecordDbModel,
    };
    use crate::database::repositories::{AnalyticsRepository, BroadcastRepository};
    use crate::database::time::now_ms;
    use crate::{Error, Result};

    /// Broadcast repository over plain vectors.
    #[derive(Default)]
    pub struct MemoryBroadcastRepository {
        pub broadcasts: Mutex<Vec<BroadcastDbModel>>,
        pub platforms: Mutex<Vec<BroadcastPlatformDbModel>>,
    }

    impl MemoryBroadcastRepository {
        /// Seed one LIVE broadcast with the given platform rows.
        pub fn live_broadcast(platforms: Vec<BroadcastPlatformDbModel>) -> (Arc<Self>, String) {
            let mut broadcast = BroadcastDbModel::new("Test stream", now_ms(), "org-1");
            broadcast.status = BroadcastStatus::Live.as_str().to_string();
            let id = broadcast.id.clone();

            let repo = Self::default();
            repo.broadcasts.lock().push(broadcast);
            *repo.platforms.lock() = platforms;
            (Arc::new(repo), id)
        }

        pub fn platform(&self, id: &str) -> BroadcastPlatformDbModel {
            self.platforms
                .lock()
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .unwrap()
        }
    }

    #[async_trait]
    impl BroadcastRepository for MemoryBroadcastRepository {
        async fn get_broadcast(&self, id: &str) -> Result<BroadcastDbModel> {
            self.broadcasts
                .lock()
                .iter()
                .find(|b| b.id == id)
                .cloned()
                .ok_or_else(|| Error::not_found("Broadcast", id))
        }

        async fn list_live_broadcasts(&self) -> Result<Vec<BroadcastDbModel>> {
            Ok(self
                .broadcasts
                .lock()
                .iter()
                .filter(|b| b.status == "LIVE")
                .cloned()
                .collect())
        }

        async fn list_platforms(
            &self,
            broadcast_id: &str,
        ) -> Result<Vec<BroadcastPlatformDbModel>> {
            Ok(self
                .platforms
                .lock()
                .iter()
                .filter(|p| p.broadcast_id == broadcast_id)
                .cloned()
                .collect())
        }

        async fn get_platform(&self, id: &str) -> Result<BroadcastPlatformDbModel> {
            self.platforms
                .lock()
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .ok_or_else(|| Error::not_found("BroadcastPlatform", id))
        }

        async fn transition_platform_status(
            &self,
            id: &str,
            expected: PlatformStatus,
            next: PlatformStatus,
            error: Option<&str>,
        ) -> Result<bool> {
            let mut platforms = self.platforms.lock();
            let Some(platform) = platforms.iter_mut().find(|p| p.id == id) else {
                return Err(Error::not_found("BroadcastPlatform", id));
            };
            if platform.status != expected.as_str() {
                return Ok(false);
            }
            platform.status = next.as_str().to_string();
            platform.last_error = error.map(str::to_string);
            platform.updated_at = now_ms();
            Ok(true)
        }

        async fn increment_failure_count(&self, id: &str) -> Result<i32> {
            let mut platforms = self.platforms.lock();
            let platform = platforms.iter_mut().find(|p| p.id == id).unwrap();
            platform.failure_count += 1;
            Ok(platform.failure_count)
        }

        async fn reset_failure_count(&self, id: &str) -> Result<()> {
            let mut platforms = self.platforms.lock();
            let platform = platforms.iter_mut().find(|p| p.id == id).unwrap();
            platform.failure_count = 0;
            platform.last_error = None;
            Ok(())
        }

        async fn set_platform_error(&self, id: &str, error: &str) -> Result<()> {
            let mut platforms = self.platforms.lock();
            let platform = platforms.iter_mut().find(|p| p.id == id).unwrap();
            platform.last_error = Some(error.to_string());
            Ok(())
        }

        async fn update_platform_viewers(&self, id: &str, count: i64) -> Result<()> {
            let mut platforms = self.platforms.lock();
            let platform = platforms.iter_mut().find(|p| p.id == id).unwrap();
            platform.viewer_count = count;
            Ok(())
        }

        async fn update_broadcast_viewers(
            &self,
            id: &str,
            current: i64,
            peak: i64,
        ) -> Result<()> {
            let mut broadcasts = self.broadcasts.lock();
            let broadcast = broadcasts.iter_mut().find(|b| b.id == id).unwrap();
            broadcast.current_viewers = current;
            broadcast.peak_viewers = peak;
            Ok(())
        }
    }

    /// Analytics store over plain vectors.
    #[derive(Default)]
    pub struct MemoryAnalytics {
        pub health: Mutex<Vec<HealthRecordDbModel>>,
        pub quality: Mutex<Vec<QualityRecordDbModel>>,
        pub alerts: Mutex<Vec<AlertRecordDbModel>>,
    }

    #[async_trait]
    impl AnalyticsRepository for MemoryAnalytics {
        async fn append_health(&self, record: &HealthRecordDbModel) -> Result<()> {
            self.health.lock().push(record.clone());
            Ok(())
        }

        async fn health_since(
            &self,
            platform_id: &str,
            since_ms: i64,
        ) -> Result<Vec<HealthRecordDbModel>> {
            Ok(self
                .health
                .lock()
                .iter()
                .filter(|r| r.platform_id == platform_id && r.checked_at >= since_ms)
                .cloned()
                .collect())
        }

        async fn append_quality(&self, record: &QualityRecordDbModel) -> Result<()> {
            self.quality.lock().push(record.clone());
            Ok(())
        }

        async fn quality_since(
            &self,
            platform_id: &str,
            since_ms: i64,
        ) -> Result<Vec<QualityRecordDbModel>> {
            Ok(self
                .quality
                .lock()
                .iter()
                .filter(|r| r.platform_id == platform_id && r.checked_at >= since_ms)
                .cloned()
                .collect())
        }

        async fn append_alert(&self, record: &AlertRecordDbModel) -> Result<()> {
            self.alerts.lock().push(record.clone());
            Ok(())
        }
    }

    /// What the scripted adapter answers a liveness probe with.
    #[derive(Debug, Clone)]
    pub enum ProbeScript {
        Live,
        Ended,
        Missing,
        Fail(String),
    }

    /// Adapter that replays a probe script, then repeats a fallback answer.
    pub struct ScriptedAdapter {
        platform: Platform,
        script: Mutex<VecDeque<ProbeScript>>,
        fallback: ProbeScript,
        pub viewers: u64,
    }

    impl ScriptedAdapter {
        pub fn new(platform: Platform, fallback: ProbeScript) -> Arc<Self> {
            Arc::new(Self {
                platform,
                script: Mutex::new(VecDeque::new()),
                fallback,
                viewers: 0,
            })
        }

        pub fn with_viewers(platform: Platform, fallback: ProbeScript, viewers: u64) -> Arc<Self> {
            Arc::new(Self {
                platform,
                script: Mutex::new(VecDeque::new()),
                fallback,
                viewers,
            })
        }

        pub fn scripted(
            platform: Platform,
            script: Vec<ProbeScript>,
            fallback: ProbeScript,
        ) -> Arc<Self> {
            Arc::new(Self {
                platform,
                script: Mutex::new(script.into()),
                fallback,
                viewers: 0,
            })
        }

        fn session(&self, state: SessionState) -> PlatformSession {
            PlatformSession {
                external_id: "ext-1".into(),
                join_url: None,
                stream_url: None,
                state,
                viewer_count: Some(self.viewers),
            }
        }
    }

    #[async_trait]
    impl PlatformAdapter for ScriptedAdapter {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn create_session(
            &self,
            _spec: &SessionSpec,
        ) -> std::result::Result<PlatformSession, AdapterError> {
            Ok(self.session(SessionState::Waiting))
        }

        async fn get_session(
            &self,
            _external_id: &str,
        ) -> std::result::Result<Option<PlatformSession>, AdapterError> {
            let step = self
                .script
                .lock()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());
            match step {
                ProbeScript::Live => Ok(Some(self.session(SessionState::Live))),
                ProbeScript::Ended => Ok(Some(self.session(SessionState::Ended))),
                ProbeScript::Missing => Ok(None),
                ProbeScript::Fail(message) => Err(AdapterError::payload(self.platform, message)),
            }
        }

        async fn start_session(&self, _external_id: &str) -> std::result::Result<(), AdapterError> {
            Ok(())
        }

        async fn end_session(&self, _external_id: &str) -> std::result::Result<(), AdapterError> {
            Ok(())
        }

        async fn viewer_count(&self, _external_id: &str) -> std::result::Result<u64, AdapterError> {
            Ok(self.viewers)
        }
    }

    /// Dispatcher wired to a log notifier and the given analytics store, so
    /// tests can count dispatches through the history markers.
    pub fn test_dispatcher(analytics: Arc<MemoryAnalytics>) -> Arc<AlertDispatcher> {
        let contacts = OwnerContacts {
            emails: vec!["ops@example.org".into()],
            push_targets: vec!["device-1".into()],
            organisation_id: "org-1".into(),
            ..Default::default()
        };
        Arc::new(AlertDispatcher::new(
            Arc::new(LogNotifier),
            Arc::new(StaticContactResolver::new(contacts)),
            analytics,
        ))
    }
}
