//! Stream quality monitor.
//!
//! Samples telemetry for every LIVE platform connection, classifies each
//! metric against its alert bands, records the sample, and escalates
//! critical degradation through the alert dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::Result;
use crate::alert::{AlertDispatcher, AlertSeverity};
use crate::config::{Band, QualityMonitorConfig, QualityThresholds};
use crate::database::models::{
    BroadcastDbModel, BroadcastPlatformDbModel, PlatformStatus, QualityRecordDbModel,
};
use crate::database::repositories::{AnalyticsRepository, BroadcastRepository};
use crate::database::time::hours_ago_ms;

/// One telemetry sample for a platform connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub bitrate_kbps: f64,
    pub fps: f64,
    pub resolution: String,
    pub dropped_frames: u64,
    pub buffer_health_pct: f64,
    pub latency_ms: f64,
    pub jitter_ms: f64,
    pub packet_loss_pct: f64,
}

impl QualityMetrics {
    /// A sample with every metric comfortably in the optimal band.
    pub fn optimal() -> Self {
        Self {
            bitrate_kbps: 6000.0,
            fps: 30.0,
            resolution: "1920x1080".to_string(),
            dropped_frames: 0,
            buffer_health_pct: 95.0,
            latency_ms: 500.0,
            jitter_ms: 10.0,
            packet_loss_pct: 0.1,
        }
    }
}

/// Which metric a quality alert is about.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityAlertType {
    LowBitrate,
    LowFps,
    HighLatency,
    PacketLoss,
    BufferIssues,
}

/// One threshold breach found in a sample.
#[derive(Debug, Clone, Serialize)]
pub struct QualityAlert {
    pub alert_type: QualityAlertType,
    pub severity: AlertSeverity,
    pub message: String,
    /// The offending metric value.
    pub metric: f64,
    pub created_at: DateTime<Utc>,
}

/// Source of quality telemetry (the media server integration).
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn sample(&self, platform: &BroadcastPlatformDbModel) -> Result<QualityMetrics>;
}

/// Telemetry source that synthesizes plausible metrics.
///
/// Stands in for a media-server stats endpoint: values hover around the
/// optimal band with occasional dips into degraded territory.
pub struct SimulatedMetricsSource;

#[async_trait]
impl MetricsSource for SimulatedMetricsSource {
    async fn sample(&self, _platform: &BroadcastPlatformDbModel) -> Result<QualityMetrics> {
        let degraded = rand::random::<f64>() < 0.1;
        let jitter = |base: f64, spread: f64| base + (rand::random::<f64>() - 0.5) * spread;

        Ok(if degraded {
            QualityMetrics {
                bitrate_kbps: jitter(2600.0, 800.0),
                fps: jitter(25.0, 4.0),
                resolution: "1280x720".to_string(),
                dropped_frames: (rand::random::<f64>() * 200.0) as u64,
                buffer_health_pct: jitter(60.0, 20.0),
                latency_ms: jitter(2200.0, 1200.0),
                jitter_ms: jitter(80.0, 40.0),
                packet_loss_pct: jitter(3.0, 3.0).max(0.0),
            }
        } else {
            QualityMetrics {
                bitrate_kbps: jitter(5500.0, 1000.0),
                fps: jitter(30.0, 1.0),
                resolution: "1920x1080".to_string(),
                dropped_frames: (rand::random::<f64>() * 10.0) as u64,
                buffer_health_pct: jitter(93.0, 6.0),
                latency_ms: jitter(700.0, 400.0),
                jitter_ms: jitter(15.0, 10.0),
                packet_loss_pct: jitter(0.2, 0.3).max(0.0),
            }
        })
    }
}

/// Classify a floor metric (higher is better) against its band.
fn classify_floor(value: f64, band: &Band) -> Option<AlertSeverity> {
    if value < band.critical {
        Some(AlertSeverity::Critical)
    } else if value < band.warning {
        Some(AlertSeverity::Warning)
    } else {
        None
    }
}

/// Classify a ceiling metric (lower is better) against its band.
fn classify_ceiling(value: f64, band: &Band) -> Option<AlertSeverity> {
    if value > band.critical {
        Some(AlertSeverity::Critical)
    } else if value > band.warning {
        Some(AlertSeverity::Warning)
    } else {
        None
    }
}

/// Evaluate a sample against the bands, producing zero or more alerts.
pub fn evaluate_metrics(metrics: &QualityMetrics, thresholds: &QualityThresholds) -> Vec<QualityAlert> {
    let mut alerts = Vec::new();
    let mut push = |alert_type, severity: Option<AlertSeverity>, metric: f64, message: String| {
        if let Some(severity) = severity {
            alerts.push(QualityAlert {
                alert_type,
                severity,
                message,
                metric,
                created_at: Utc::now(),
            });
        }
    };

    push(
        QualityAlertType::LowBitrate,
        classify_floor(metrics.bitrate_kbps, &thresholds.bitrate_kbps),
        metrics.bitrate_kbps,
        format!("Bitrate at {:.0} kbps", metrics.bitrate_kbps),
    );
    push(
        QualityAlertType::LowFps,
        classify_floor(metrics.fps, &thresholds.fps),
        metrics.fps,
        format!("Frame rate at {:.1} fps", metrics.fps),
    );
    push(
        QualityAlertType::HighLatency,
        classify_ceiling(metrics.latency_ms, &thresholds.latency_ms),
        metrics.latency_ms,
        format!("Latency at {:.0} ms", metrics.latency_ms),
    );
    push(
        QualityAlertType::PacketLoss,
        classify_ceiling(metrics.packet_loss_pct, &thresholds.packet_loss_pct),
        metrics.packet_loss_pct,
        format!("Packet loss at {:.1}%", metrics.packet_loss_pct),
    );
    push(
        QualityAlertType::BufferIssues,
        classify_floor(metrics.buffer_health_pct, &thresholds.buffer_health_pct),
        metrics.buffer_health_pct,
        format!("Buffer health at {:.0}%", metrics.buffer_health_pct),
    );

    alerts
}

/// Quality score: 100 minus a fixed penalty per sub-optimal metric.
pub fn calculate_quality_score(metrics: &QualityMetrics, thresholds: &QualityThresholds) -> f64 {
    let mut score: f64 = 100.0;
    if metrics.bitrate_kbps < thresholds.bitrate_kbps.optimal {
        score -= 20.0;
    }
    if metrics.fps < thresholds.fps.optimal {
        score -= 15.0;
    }
    if metrics.latency_ms > thresholds.latency_ms.optimal {
        score -= 20.0;
    }
    if metrics.packet_loss_pct > thresholds.packet_loss_pct.optimal {
        score -= 25.0;
    }
    if metrics.buffer_health_pct < thresholds.buffer_health_pct.optimal {
        score -= 20.0;
    }
    score.max(0.0)
}

/// Remediation hints for every sub-optimal metric.
pub fn recommendations(metrics: &QualityMetrics, thresholds: &QualityThresholds) -> Vec<String> {
    let mut hints = Vec::new();
    if metrics.bitrate_kbps < thresholds.bitrate_kbps.optimal {
        hints.push(
            "Reduce output resolution or free up upload bandwidth to stabilize the bitrate"
                .to_string(),
        );
    }
    if metrics.fps < thresholds.fps.optimal {
        hints.push("Lower the encoding preset or resolution to restore the frame rate".to_string());
    }
    if metrics.latency_ms > thresholds.latency_ms.optimal {
        hints.push("Switch to a closer ingest server or shorten the keyframe interval".to_string());
    }
    if metrics.packet_loss_pct > thresholds.packet_loss_pct.optimal {
        hints.push("Check the local network for congestion and prefer a wired uplink".to_string());
    }
    if metrics.buffer_health_pct < thresholds.buffer_health_pct.optimal {
        hints.push("Increase the encoder buffer or smooth out bitrate spikes".to_string());
    }
    if hints.is_empty() {
        hints.push("Stream quality is optimal, no action needed".to_string());
    }
    hints
}

/// The stream quality monitor.
pub struct QualityMonitor<BR, AR>
where
    BR: BroadcastRepository + 'static,
    AR: AnalyticsRepository + 'static,
{
    broadcasts: Arc<BR>,
    analytics: Arc<AR>,
    source: Arc<dyn MetricsSource>,
    dispatcher: Arc<AlertDispatcher>,
    config: QualityMonitorConfig,
}

impl<BR, AR> QualityMonitor<BR, AR>
where
    BR: BroadcastRepository + 'static,
    AR: AnalyticsRepository + 'static,
{
    pub fn new(
        broadcasts: Arc<BR>,
        analytics: Arc<AR>,
        source: Arc<dyn MetricsSource>,
        dispatcher: Arc<AlertDispatcher>,
        config: QualityMonitorConfig,
    ) -> Self {
        Self {
            broadcasts,
            analytics,
            source,
            dispatcher,
            config,
        }
    }

    /// Configured period between cycles.
    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.config.check_interval_ms)
    }

    /// One monitoring cycle over every LIVE platform of every LIVE broadcast.
    pub async fn run_cycle(&self) {
        let broadcasts = match self.broadcasts.list_live_broadcasts().await {
            Ok(broadcasts) => broadcasts,
            Err(error) => {
                warn!(%error, "could not list live broadcasts, skipping quality cycle");
                return;
            }
        };

        debug!(broadcasts = broadcasts.len(), "quality cycle starting");
        for broadcast in &broadcasts {
            let platforms = match self.broadcasts.list_platforms(&broadcast.id).await {
                Ok(platforms) => platforms,
                Err(error) => {
                    warn!(broadcast_id = %broadcast.id, %error, "could not list platforms");
                    continue;
                }
            };

            for platform_row in platforms
                .iter()
                .filter(|p| p.status() == Some(PlatformStatus::Live))
            {
                if let Err(error) = self.check_platform(broadcast, platform_row).await {
                    warn!(
                        platform_id = %platform_row.id,
                        %error,
                        "quality check failed for platform"
                    );
                }
            }
        }
    }

    /// On-demand quality check for one platform of a broadcast.
    pub async fn check_platform_quality(
        &self,
        broadcast_id: &str,
        platform_id: &str,
    ) -> Result<Vec<QualityAlert>> {
        let broadcast = self.broadcasts.get_broadcast(broadcast_id).await?;
        let platform_row = self.broadcasts.get_platform(platform_id).await?;
        if platform_row.broadcast_id != broadcast.id {
            return Err(crate::Error::validation(format!(
                "platform {platform_id} does not belong to broadcast {broadcast_id}"
            )));
        }
        self.check_platform(&broadcast, &platform_row).await
    }

    /// Quality analytics rows for a platform over the trailing window.
    pub async fn quality_history(
        &self,
        platform_id: &str,
        hours: u32,
    ) -> Result<Vec<QualityRecordDbModel>> {
        self.analytics
            .quality_since(platform_id, hours_ago_ms(hours))
            .await
    }

    async fn check_platform(
        &self,
        broadcast: &BroadcastDbModel,
        platform_row: &BroadcastPlatformDbModel,
    ) -> Result<Vec<QualityAlert>> {
        let metrics = self.source.sample(platform_row).await?;
        let thresholds = &self.config.thresholds;
        let alerts = evaluate_metrics(&metrics, thresholds);
        let score = calculate_quality_score(&metrics, thresholds);

        let record = QualityRecordDbModel {
            id: uuid::Uuid::new_v4().to_string(),
            broadcast_id: broadcast.id.clone(),
            platform_id: platform_row.id.clone(),
            platform: platform_row.platform.clone(),
            bitrate_kbps: metrics.bitrate_kbps,
            fps: metrics.fps,
            resolution: metrics.resolution.clone(),
            dropped_frames: metrics.dropped_frames as i64,
            buffer_health_pct: metrics.buffer_health_pct,
            latency_ms: metrics.latency_ms,
            jitter_ms: metrics.jitter_ms,
            packet_loss_pct: metrics.packet_loss_pct,
            score,
            checked_at: crate::database::time::now_ms(),
        };
        if let Err(error) = self.analytics.append_quality(&record).await {
            warn!(platform_id = %platform_row.id, %error, "could not record quality row");
        }

        let critical: Vec<&QualityAlert> = alerts
            .iter()
            .filter(|a| a.severity == AlertSeverity::Critical)
            .collect();

        if !critical.is_empty() {
            let combined = critical
                .iter()
                .map(|a| a.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            self.broadcasts
                .set_platform_error(&platform_row.id, &combined)
                .await?;

            if let Some(platform) = platform_row.platform() {
                let messages: Vec<String> = alerts.iter().map(|a| a.message.clone()).collect();
                self.dispatcher
                    .quality_issue(&broadcast.id, platform, AlertSeverity::Critical, &messages)
                    .await;
            }
        } else if !alerts.is_empty() {
            info!(
                broadcast_id = %broadcast.id,
                platform = %platform_row.platform,
                score,
                issues = alerts.len(),
                "quality warnings observed"
            );
        }

        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use platform_adapters::Platform;

    use crate::monitor::test_support::{
        MemoryAnalytics, MemoryBroadcastRepository, test_dispatcher,
    };

    fn metrics_with_bitrate(bitrate_kbps: f64) -> QualityMetrics {
        QualityMetrics {
            bitrate_kbps,
            ..QualityMetrics::optimal()
        }
    }

    #[test]
    fn test_bitrate_banding() {
        let thresholds = QualityThresholds::default();

        let critical = evaluate_metrics(&metrics_with_bitrate(2000.0), &thresholds);
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].alert_type, QualityAlertType::LowBitrate);
        assert_eq!(critical[0].severity, AlertSeverity::Critical);

        let warning = evaluate_metrics(&metrics_with_bitrate(2800.0), &thresholds);
        assert_eq!(warning.len(), 1);
        assert_eq!(warning[0].severity, AlertSeverity::Warning);

        assert!(evaluate_metrics(&metrics_with_bitrate(6000.0), &thresholds).is_empty());
    }

    #[test]
    fn test_ceiling_banding() {
        let thresholds = QualityThresholds::default();

        let mut metrics = QualityMetrics::optimal();
        metrics.latency_ms = 3500.0;
        metrics.packet_loss_pct = 3.0;

        let alerts = evaluate_metrics(&metrics, &thresholds);
        assert_eq!(alerts.len(), 2);
        assert!(alerts.iter().any(|a| a.alert_type == QualityAlertType::HighLatency
            && a.severity == AlertSeverity::Critical));
        assert!(alerts.iter().any(|a| a.alert_type == QualityAlertType::PacketLoss
            && a.severity == AlertSeverity::Warning));
    }

    #[test]
    fn test_score_monotone_in_bitrate() {
        let thresholds = QualityThresholds::default();
        let mut previous = -1.0;
        for bitrate in [1000.0, 2000.0, 2800.0, 4000.0, 5000.0, 8000.0] {
            let score = calculate_quality_score(&metrics_with_bitrate(bitrate), &thresholds);
            assert!(score >= previous, "score regressed at bitrate {bitrate}");
            previous = score;
        }
    }

    #[test]
    fn test_score_floors_at_zero() {
        let thresholds = QualityThresholds::default();
        let metrics = QualityMetrics {
            bitrate_kbps: 100.0,
            fps: 5.0,
            resolution: "640x360".to_string(),
            dropped_frames: 5000,
            buffer_health_pct: 5.0,
            latency_ms: 9000.0,
            jitter_ms: 500.0,
            packet_loss_pct: 30.0,
        };
        assert_eq!(calculate_quality_score(&metrics, &thresholds), 0.0);
    }

    #[test]
    fn test_recommendations() {
        let thresholds = QualityThresholds::default();

        let optimal = recommendations(&QualityMetrics::optimal(), &thresholds);
        assert_eq!(optimal, vec!["Stream quality is optimal, no action needed"]);

        // Sub-optimal but not alert-worthy still earns a hint.
        let hints = recommendations(&metrics_with_bitrate(4000.0), &thresholds);
        assert_eq!(hints.len(), 1);
        assert!(hints[0].contains("bitrate"));
    }

    /// Metrics source that always returns the same sample.
    struct FixedSource(QualityMetrics);

    #[async_trait]
    impl MetricsSource for FixedSource {
        async fn sample(&self, _platform: &BroadcastPlatformDbModel) -> Result<QualityMetrics> {
            Ok(self.0.clone())
        }
    }

    fn monitor_with(
        metrics: QualityMetrics,
    ) -> (
        QualityMonitor<MemoryBroadcastRepository, MemoryAnalytics>,
        Arc<MemoryBroadcastRepository>,
        Arc<MemoryAnalytics>,
        String,
        String,
    ) {
        let (repo, broadcast_id) = MemoryBroadcastRepository::live_broadcast(vec![]);
        let mut platform = BroadcastPlatformDbModel::new(&broadcast_id, Platform::Facebook);
        platform.status = PlatformStatus::Live.as_str().to_string();
        platform.external_id = Some("ext-1".into());
        let platform_id = platform.id.clone();
        repo.platforms.lock().push(platform);

        let analytics = Arc::new(MemoryAnalytics::default());
        let monitor = QualityMonitor::new(
            repo.clone(),
            analytics.clone(),
            Arc::new(FixedSource(metrics)),
            test_dispatcher(analytics.clone()),
            QualityMonitorConfig::default(),
        );
        (monitor, repo, analytics, broadcast_id, platform_id)
    }

    #[tokio::test]
    async fn test_critical_sample_marks_platform_and_alerts() {
        let (monitor, repo, analytics, _, platform_id) = monitor_with(metrics_with_bitrate(2000.0));

        monitor.run_cycle().await;

        let platform = repo.platform(&platform_id);
        assert!(platform.last_error.as_deref().unwrap().contains("Bitrate"));

        assert_eq!(analytics.quality.lock().len(), 1);
        let alerts = analytics.alerts.lock().clone();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, "QUALITY_ISSUE");
        assert_eq!(alerts[0].severity, "CRITICAL");
    }

    #[tokio::test]
    async fn test_warning_sample_only_logs() {
        let (monitor, repo, analytics, _, platform_id) = monitor_with(metrics_with_bitrate(2800.0));

        monitor.run_cycle().await;

        // WARNING-only alerts leave the platform record untouched.
        let platform = repo.platform(&platform_id);
        assert!(platform.last_error.is_none());
        assert_eq!(analytics.quality.lock().len(), 1);
        assert!(analytics.alerts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_on_demand_check_validates_ownership() {
        let (monitor, repo, _, broadcast_id, platform_id) =
            monitor_with(metrics_with_bitrate(6000.0));

        let alerts = monitor
            .check_platform_quality(&broadcast_id, &platform_id)
            .await
            .unwrap();
        assert!(alerts.is_empty());

        // A platform from another broadcast is rejected.
        let mut stray = BroadcastPlatformDbModel::new("other", Platform::Zoom);
        stray.status = PlatformStatus::Live.as_str().to_string();
        let stray_id = stray.id.clone();
        repo.platforms.lock().push(stray);
        assert!(
            monitor
                .check_platform_quality(&broadcast_id, &stray_id)
                .await
                .is_err()
        );
    }
}
