//! Alert and notification types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use platform_adapters::Platform;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::Result;

/// Alert severity, ordered from least to most urgent.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// What kind of condition an alert reports.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    PlatformFailure,
    QualityIssue,
    ViewerSpike,
    ViewerDrop,
}

/// Dispatch envelope handed to [`crate::alert::AlertDispatcher`].
///
/// Consumed immediately; only a best-effort history marker outlives the
/// dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub broadcast_id: String,
    pub platform: Option<Platform>,
    /// Free-form context rendered into notification templates.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
        broadcast_id: impl Into<String>,
    ) -> Self {
        Self {
            alert_type,
            severity,
            title: title.into(),
            message: message.into(),
            broadcast_id: broadcast_id.into(),
            platform: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Delivery channels the notification service understands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
    Webhook,
}

/// Which channels a dispatch fans out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSelection {
    pub email: bool,
    pub sms: bool,
    pub push: bool,
    pub webhook: bool,
}

impl ChannelSelection {
    /// Default selection for a severity: email and push always, SMS only
    /// when the situation is critical, webhook off unless asked for.
    pub fn defaults_for(severity: AlertSeverity) -> Self {
        Self {
            email: true,
            sms: severity == AlertSeverity::Critical,
            push: true,
            webhook: false,
        }
    }

    /// Apply a caller-supplied partial override.
    pub fn merge(self, overrides: &ChannelOverride) -> Self {
        Self {
            email: overrides.email.unwrap_or(self.email),
            sms: overrides.sms.unwrap_or(self.sms),
            push: overrides.push.unwrap_or(self.push),
            webhook: overrides.webhook.unwrap_or(self.webhook),
        }
    }
}

/// Partial channel override; `None` keeps the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelOverride {
    pub email: Option<bool>,
    pub sms: Option<bool>,
    pub push: Option<bool>,
    pub webhook: Option<bool>,
}

impl ChannelOverride {
    /// Push only, everything else suppressed.
    pub fn push_only() -> Self {
        Self {
            email: Some(false),
            sms: Some(false),
            push: Some(true),
            webhook: Some(false),
        }
    }
}

/// One delivery request against the notification service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub channel: NotificationChannel,
    pub recipients: Vec<String>,
    pub title: String,
    pub message: String,
    /// Template variables for the delivery layer.
    pub variables: serde_json::Value,
    /// Tenant context.
    pub organisation_id: String,
    pub branch_id: Option<String>,
}

/// Delivery service consumed by the dispatcher.
///
/// This core only calls it; delivery itself lives elsewhere.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, request: NotificationRequest) -> Result<()>;
}

/// Notifier that logs deliveries instead of sending them.
///
/// Stands in wherever a real delivery service is not wired up (push and
/// webhook deliveries, local runs).
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, request: NotificationRequest) -> Result<()> {
        info!(
            channel = %request.channel,
            recipients = request.recipients.len(),
            title = %request.title,
            "notification delivered to log"
        );
        Ok(())
    }
}

/// Contact details of a broadcast's owning organisation.
#[derive(Debug, Clone, Default)]
pub struct OwnerContacts {
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub push_targets: Vec<String>,
    pub webhook_url: Option<String>,
    pub organisation_id: String,
    pub branch_id: Option<String>,
}

/// Resolves a broadcast's owner contacts.
#[async_trait]
pub trait ContactResolver: Send + Sync {
    async fn resolve(&self, broadcast_id: &str) -> Result<OwnerContacts>;
}

/// Resolver that answers every lookup with one fixed contact set.
pub struct StaticContactResolver {
    contacts: OwnerContacts,
}

impl StaticContactResolver {
    pub fn new(contacts: OwnerContacts) -> Self {
        Self { contacts }
    }
}

#[async_trait]
impl ContactResolver for StaticContactResolver {
    async fn resolve(&self, _broadcast_id: &str) -> Result<OwnerContacts> {
        Ok(self.contacts.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Info < AlertSeverity::Warning);
        assert!(AlertSeverity::Warning < AlertSeverity::Critical);
    }

    #[test]
    fn test_default_channels_by_severity() {
        let warning = ChannelSelection::defaults_for(AlertSeverity::Warning);
        assert!(warning.email && warning.push);
        assert!(!warning.sms && !warning.webhook);

        let critical = ChannelSelection::defaults_for(AlertSeverity::Critical);
        assert!(critical.sms);
    }

    #[test]
    fn test_override_merge() {
        let merged =
            ChannelSelection::defaults_for(AlertSeverity::Info).merge(&ChannelOverride::push_only());
        assert!(merged.push);
        assert!(!merged.email && !merged.sms && !merged.webhook);

        // An empty override keeps the defaults.
        let kept =
            ChannelSelection::defaults_for(AlertSeverity::Critical).merge(&ChannelOverride::default());
        assert_eq!(kept, ChannelSelection::defaults_for(AlertSeverity::Critical));
    }
}
