//! Multi-channel alert dispatcher.

use std::sync::Arc;

use futures::future::join_all;
use platform_adapters::Platform;
use serde_json::json;
use tracing::{debug, warn};

use super::types::{
    Alert, AlertSeverity, AlertType, ChannelOverride, ChannelSelection, ContactResolver,
    NotificationChannel, NotificationRequest, Notifier, OwnerContacts,
};
use crate::database::models::AlertRecordDbModel;
use crate::database::repositories::AnalyticsRepository;
use crate::database::time::now_ms;

/// Fans a structured alert out to the owner's enabled channels.
///
/// Channel deliveries run concurrently and independently; a failing channel
/// is logged and never blocks or fails the others, and `send_alert` itself
/// never raises. After dispatch a best-effort history marker is appended.
pub struct AlertDispatcher {
    notifier: Arc<dyn Notifier>,
    contacts: Arc<dyn ContactResolver>,
    analytics: Arc<dyn AnalyticsRepository>,
}

impl AlertDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        contacts: Arc<dyn ContactResolver>,
        analytics: Arc<dyn AnalyticsRepository>,
    ) -> Self {
        Self {
            notifier,
            contacts,
            analytics,
        }
    }

    /// Dispatch an alert to every enabled channel.
    pub async fn send_alert(&self, alert: Alert, overrides: Option<ChannelOverride>) {
        let contacts = match self.contacts.resolve(&alert.broadcast_id).await {
            Ok(contacts) => contacts,
            Err(error) => {
                warn!(
                    broadcast_id = %alert.broadcast_id,
                    %error,
                    "could not resolve alert contacts, dropping dispatch"
                );
                return;
            }
        };

        let selection = overrides
            .map(|o| ChannelSelection::defaults_for(alert.severity).merge(&o))
            .unwrap_or_else(|| ChannelSelection::defaults_for(alert.severity));

        let requests = self.build_requests(&alert, &selection, &contacts);
        if requests.is_empty() {
            debug!(
                broadcast_id = %alert.broadcast_id,
                alert_type = %alert.alert_type,
                "no enabled channel has recipients, skipping dispatch"
            );
        }

        // Settle all channels: each future swallows and logs its own failure.
        join_all(requests.into_iter().map(|request| {
            let channel = request.channel;
            let broadcast_id = alert.broadcast_id.clone();
            async move {
                if let Err(error) = self.notifier.send(request).await {
                    warn!(
                        %channel,
                        broadcast_id = %broadcast_id,
                        %error,
                        "alert channel delivery failed"
                    );
                }
            }
        }))
        .await;

        let marker = AlertRecordDbModel {
            id: uuid::Uuid::new_v4().to_string(),
            alert_type: alert.alert_type.to_string(),
            severity: alert.severity.to_string(),
            title: alert.title.clone(),
            broadcast_id: alert.broadcast_id.clone(),
            platform: alert.platform.map(|p| p.as_str().to_string()),
            created_at: now_ms(),
        };
        if let Err(error) = self.analytics.append_alert(&marker).await {
            warn!(%error, "could not record alert history marker");
        }
    }

    fn build_requests(
        &self,
        alert: &Alert,
        selection: &ChannelSelection,
        contacts: &OwnerContacts,
    ) -> Vec<NotificationRequest> {
        let variables = json!({
            "alert_type": alert.alert_type,
            "severity": alert.severity,
            "broadcast_id": alert.broadcast_id,
            "platform": alert.platform,
            "metadata": alert.metadata,
            "created_at": alert.created_at.to_rfc3339(),
        });

        let request = |channel, recipients: Vec<String>| NotificationRequest {
            channel,
            recipients,
            title: alert.title.clone(),
            message: alert.message.clone(),
            variables: variables.clone(),
            organisation_id: contacts.organisation_id.clone(),
            branch_id: contacts.branch_id.clone(),
        };

        let mut requests = Vec::new();
        if selection.email && !contacts.emails.is_empty() {
            requests.push(request(NotificationChannel::Email, contacts.emails.clone()));
        }
        if selection.sms && !contacts.phone_numbers.is_empty() {
            requests.push(request(
                NotificationChannel::Sms,
                contacts.phone_numbers.clone(),
            ));
        }
        if selection.push && !contacts.push_targets.is_empty() {
            requests.push(request(
                NotificationChannel::Push,
                contacts.push_targets.clone(),
            ));
        }
        if selection.webhook
            && let Some(url) = &contacts.webhook_url
        {
            requests.push(request(NotificationChannel::Webhook, vec![url.clone()]));
        }
        requests
    }

    /// A platform's health checks exhausted their recovery budget.
    pub async fn platform_failure(
        &self,
        broadcast_id: &str,
        platform: Platform,
        error: &str,
        failure_count: i32,
    ) {
        let alert = Alert::new(
            AlertType::PlatformFailure,
            AlertSeverity::Critical,
            format!("{platform} stream connection lost"),
            format!(
                "The {platform} connection failed {failure_count} consecutive health checks and automatic recovery has stopped. Last error: {error}"
            ),
            broadcast_id,
        )
        .with_platform(platform)
        .with_metadata(json!({"error": error, "failure_count": failure_count}));

        self.send_alert(alert, None).await;
    }

    /// Quality thresholds were breached on a platform.
    pub async fn quality_issue(
        &self,
        broadcast_id: &str,
        platform: Platform,
        severity: AlertSeverity,
        issues: &[String],
    ) {
        let alert = Alert::new(
            AlertType::QualityIssue,
            severity,
            format!("{platform} stream quality degraded"),
            issues.join("; "),
            broadcast_id,
        )
        .with_platform(platform)
        .with_metadata(json!({"issues": issues}));

        self.send_alert(alert, None).await;
    }

    /// Viewer count jumped past the spike threshold.
    pub async fn viewer_spike(&self, broadcast_id: &str, previous: i64, current: i64) {
        let alert = Alert::new(
            AlertType::ViewerSpike,
            AlertSeverity::Info,
            "Viewer spike".to_string(),
            format!("Viewers jumped from {previous} to {current}"),
            broadcast_id,
        )
        .with_metadata(json!({"previous": previous, "current": current}));

        self.send_alert(alert, Some(ChannelOverride::push_only()))
            .await;
    }

    /// Viewer count fell past the drop threshold.
    pub async fn viewer_drop(&self, broadcast_id: &str, previous: i64, current: i64) {
        let alert = Alert::new(
            AlertType::ViewerDrop,
            AlertSeverity::Warning,
            "Viewer drop".to_string(),
            format!("Viewers fell from {previous} to {current}"),
            broadcast_id,
        )
        .with_metadata(json!({"previous": previous, "current": current}));

        self.send_alert(alert, Some(ChannelOverride::push_only()))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::database::models::{HealthRecordDbModel, QualityRecordDbModel};
    use crate::{Error, Result};

    /// Notifier that records requests and fails selected channels.
    struct RecordingNotifier {
        sent: Mutex<Vec<NotificationRequest>>,
        failing: Vec<NotificationChannel>,
    }

    impl RecordingNotifier {
        fn new(failing: Vec<NotificationChannel>) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                failing,
            })
        }

        fn channels(&self) -> Vec<NotificationChannel> {
            self.sent.lock().iter().map(|r| r.channel).collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, request: NotificationRequest) -> Result<()> {
            let channel = request.channel;
            self.sent.lock().push(request);
            if self.failing.contains(&channel) {
                return Err(Error::Other(format!("{channel} delivery failed")));
            }
            Ok(())
        }
    }

    /// Analytics stub that records alert markers in memory.
    struct MemoryAnalytics {
        alerts: Mutex<Vec<AlertRecordDbModel>>,
    }

    #[async_trait]
    impl AnalyticsRepository for MemoryAnalytics {
        async fn append_health(&self, _record: &HealthRecordDbModel) -> Result<()> {
            Ok(())
        }
        async fn health_since(
            &self,
            _platform_id: &str,
            _since_ms: i64,
        ) -> Result<Vec<HealthRecordDbModel>> {
            Ok(Vec::new())
        }
        async fn append_quality(&self, _record: &QualityRecordDbModel) -> Result<()> {
            Ok(())
        }
        async fn quality_since(
            &self,
            _platform_id: &str,
            _since_ms: i64,
        ) -> Result<Vec<QualityRecordDbModel>> {
            Ok(Vec::new())
        }
        async fn append_alert(&self, record: &AlertRecordDbModel) -> Result<()> {
            self.alerts.lock().push(record.clone());
            Ok(())
        }
    }

    fn contacts() -> OwnerContacts {
        OwnerContacts {
            emails: vec!["ops@example.org".into()],
            phone_numbers: vec!["+15550001".into()],
            push_targets: vec!["device-1".into()],
            webhook_url: Some("https://hooks.example.org/alerts".into()),
            organisation_id: "org-1".into(),
            branch_id: None,
        }
    }

    fn dispatcher(
        notifier: Arc<RecordingNotifier>,
    ) -> (AlertDispatcher, Arc<MemoryAnalytics>) {
        let analytics = Arc::new(MemoryAnalytics {
            alerts: Mutex::new(Vec::new()),
        });
        let dispatcher = AlertDispatcher::new(
            notifier,
            Arc::new(crate::alert::StaticContactResolver::new(contacts())),
            analytics.clone(),
        );
        (dispatcher, analytics)
    }

    fn critical_alert() -> Alert {
        Alert::new(
            AlertType::PlatformFailure,
            AlertSeverity::Critical,
            "Zoom stream connection lost",
            "recovery exhausted",
            "b1",
        )
        .with_platform(Platform::Zoom)
    }

    #[tokio::test]
    async fn test_critical_alert_hits_email_sms_push() {
        let notifier = RecordingNotifier::new(vec![]);
        let (dispatcher, analytics) = dispatcher(notifier.clone());

        dispatcher.send_alert(critical_alert(), None).await;

        let channels = notifier.channels();
        assert!(channels.contains(&NotificationChannel::Email));
        assert!(channels.contains(&NotificationChannel::Sms));
        assert!(channels.contains(&NotificationChannel::Push));
        assert!(!channels.contains(&NotificationChannel::Webhook));

        let markers = analytics.alerts.lock();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].severity, "CRITICAL");
        assert_eq!(markers[0].platform.as_deref(), Some("ZOOM"));
    }

    #[tokio::test]
    async fn test_failing_email_does_not_block_other_channels() {
        let notifier = RecordingNotifier::new(vec![NotificationChannel::Email]);
        let (dispatcher, analytics) = dispatcher(notifier.clone());

        dispatcher.send_alert(critical_alert(), None).await;

        // Email was attempted, failed, and the rest still went out.
        let channels = notifier.channels();
        assert!(channels.contains(&NotificationChannel::Email));
        assert!(channels.contains(&NotificationChannel::Sms));
        assert!(channels.contains(&NotificationChannel::Push));
        assert_eq!(analytics.alerts.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_warning_alert_skips_sms() {
        let notifier = RecordingNotifier::new(vec![]);
        let (dispatcher, _) = dispatcher(notifier.clone());

        let alert = Alert::new(
            AlertType::QualityIssue,
            AlertSeverity::Warning,
            "quality degraded",
            "low bitrate",
            "b1",
        );
        dispatcher.send_alert(alert, None).await;

        assert!(!notifier.channels().contains(&NotificationChannel::Sms));
    }

    #[tokio::test]
    async fn test_viewer_spike_is_push_only() {
        let notifier = RecordingNotifier::new(vec![]);
        let (dispatcher, _) = dispatcher(notifier.clone());

        dispatcher.viewer_spike("b1", 100, 400).await;

        assert_eq!(notifier.channels(), vec![NotificationChannel::Push]);
    }

    #[tokio::test]
    async fn test_webhook_override_enables_webhook() {
        let notifier = RecordingNotifier::new(vec![]);
        let (dispatcher, _) = dispatcher(notifier.clone());

        let overrides = ChannelOverride {
            webhook: Some(true),
            ..Default::default()
        };
        dispatcher.send_alert(critical_alert(), Some(overrides)).await;

        let channels = notifier.channels();
        assert!(channels.contains(&NotificationChannel::Webhook));
    }
}
