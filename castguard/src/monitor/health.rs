//! Stream health monitor.
//!
//! On every cycle, each LIVE broadcast's platform connections are probed for
//! liveness. A failing platform moves LIVE → ERROR and gets a bounded number
//! of automatic recovery probes across cycles; once the failure counter
//! reaches the retry budget, recovery stops and a single CRITICAL alert goes
//! out. Failures never escape the cycle: one bad broadcast must not block
//! the others.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use platform_adapters::PlatformAdapter;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::AdapterMap;
use crate::alert::AlertDispatcher;
use crate::config::HealthMonitorConfig;
use crate::database::models::{
    BroadcastDbModel, BroadcastPlatformDbModel, HealthRecordDbModel, PlatformStatus,
};
use crate::database::repositories::{AnalyticsRepository, BroadcastRepository};
use crate::database::time::hours_ago_ms;
use crate::Result;

/// Outcome of one liveness probe against one platform connection.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    /// Platform identifier text as stored on the row.
    pub platform: String,
    /// BroadcastPlatform row id.
    pub platform_id: String,
    pub healthy: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

struct ProbeOutcome {
    result: HealthCheckResult,
    /// Viewer count the platform reported alongside the session, if any.
    viewers: Option<u64>,
}

/// The stream health monitor.
pub struct HealthMonitor<BR, AR>
where
    BR: BroadcastRepository + 'static,
    AR: AnalyticsRepository + 'static,
{
    broadcasts: Arc<BR>,
    analytics: Arc<AR>,
    adapters: Arc<AdapterMap>,
    dispatcher: Arc<AlertDispatcher>,
    config: HealthMonitorConfig,
}

impl<BR, AR> HealthMonitor<BR, AR>
where
    BR: BroadcastRepository + 'static,
    AR: AnalyticsRepository + 'static,
{
    pub fn new(
        broadcasts: Arc<BR>,
        analytics: Arc<AR>,
        adapters: Arc<AdapterMap>,
        dispatcher: Arc<AlertDispatcher>,
        config: HealthMonitorConfig,
    ) -> Self {
        Self {
            broadcasts,
            analytics,
            adapters,
            dispatcher,
            config,
        }
    }

    /// Configured period between cycles.
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.config.check_interval_ms)
    }

    /// One monitoring cycle over every LIVE broadcast.
    pub async fn run_cycle(&self) {
        let broadcasts = match self.broadcasts.list_live_broadcasts().await {
            Ok(broadcasts) => broadcasts,
            Err(error) => {
                warn!(%error, "could not list live broadcasts, skipping health cycle");
                return;
            }
        };

        debug!(broadcasts = broadcasts.len(), "health cycle starting");
        for broadcast in &broadcasts {
            if let Err(error) = self.check_broadcast(broadcast).await {
                warn!(
                    broadcast_id = %broadcast.id,
                    %error,
                    "health check failed for broadcast"
                );
            }
        }
    }

    /// Check one broadcast's platforms, in stable insertion order.
    ///
    /// Also the on-demand entry point: the same sequence runs synchronously
    /// for an operator and returns the full per-platform results.
    pub async fn check_broadcast_health(&self, broadcast_id: &str) -> Result<Vec<HealthCheckResult>> {
        let broadcast = self.broadcasts.get_broadcast(broadcast_id).await?;
        self.check_broadcast(&broadcast).await
    }

    /// Operator-triggered probe that ignores the broadcast lifecycle gate.
    pub async fn force_health_check(&self, broadcast_id: &str) -> Result<Vec<HealthCheckResult>> {
        let results = self.check_broadcast_health(broadcast_id).await?;
        info!(
            broadcast_id,
            healthy = results.iter().filter(|r| r.healthy).count(),
            total = results.len(),
            "forced health check completed"
        );
        Ok(results)
    }

    /// Share of platforms currently in a live or connected state, 0..=100.
    pub async fn broadcast_health_score(&self, broadcast_id: &str) -> Result<f64> {
        let platforms = self.broadcasts.list_platforms(broadcast_id).await?;
        if platforms.is_empty() {
            return Ok(100.0);
        }
        let healthy = platforms
            .iter()
            .filter(|p| p.status().is_some_and(|s| s.is_healthy()))
            .count();
        Ok(healthy as f64 / platforms.len() as f64 * 100.0)
    }

    /// Health analytics rows for a platform over the trailing window.
    pub async fn platform_health_history(
        &self,
        platform_id: &str,
        hours: u32,
    ) -> Result<Vec<HealthRecordDbModel>> {
        self.analytics
            .health_since(platform_id, hours_ago_ms(hours))
            .await
    }

    async fn check_broadcast(&self, broadcast: &BroadcastDbModel) -> Result<Vec<HealthCheckResult>> {
        let platforms = self.broadcasts.list_platforms(&broadcast.id).await?;
        let mut results = Vec::with_capacity(platforms.len());
        let mut live_viewers: Option<i64> = None;

        for platform_row in &platforms {
            let outcome = self.probe(broadcast, platform_row).await;

            let record = HealthRecordDbModel {
                id: uuid::Uuid::new_v4().to_string(),
                broadcast_id: broadcast.id.clone(),
                platform_id: platform_row.id.clone(),
                platform: platform_row.platform.clone(),
                healthy: outcome.result.healthy,
                latency_ms: outcome.result.latency_ms as i64,
                error: outcome.result.error.clone(),
                checked_at: crate::database::time::now_ms(),
            };
            if let Err(error) = self.analytics.append_health(&record).await {
                warn!(platform_id = %platform_row.id, %error, "could not record health row");
            }

            if outcome.result.healthy {
                if platform_row.status() == Some(PlatformStatus::Live)
                    && let Some(viewers) = self.refresh_viewers(platform_row, &outcome).await
                {
                    *live_viewers.get_or_insert(0) += viewers;
                }
            } else {
                self.handle_unhealthy(broadcast, platform_row, &outcome.result)
                    .await?;
            }

            results.push(outcome.result);
        }

        if let Some(current) = live_viewers {
            self.aggregate_viewers(broadcast, current).await;
        }

        Ok(results)
    }

    fn adapter_of(&self, platform_row: &BroadcastPlatformDbModel) -> Option<&Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform_row.platform()?)
    }

    /// Probe one platform connection's liveness, measuring latency.
    async fn probe(
        &self,
        broadcast: &BroadcastDbModel,
        platform_row: &BroadcastPlatformDbModel,
    ) -> ProbeOutcome {
        let unhealthy = |latency_ms: u64, error: String| ProbeOutcome {
            result: HealthCheckResult {
                platform: platform_row.platform.clone(),
                platform_id: platform_row.id.clone(),
                healthy: false,
                latency_ms,
                error: Some(error),
                checked_at: Utc::now(),
            },
            viewers: None,
        };

        let Some(adapter) = self.adapter_of(platform_row) else {
            return unhealthy(
                0,
                format!("no adapter configured for platform {}", platform_row.platform),
            );
        };
        let Some(external_id) = platform_row.external_id.as_deref() else {
            return unhealthy(0, "platform has no session id".to_string());
        };

        let start = Instant::now();
        let lookup = adapter.get_session(external_id).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match lookup {
            Ok(Some(session)) if session.state.is_alive() => {
                debug!(
                    broadcast_id = %broadcast.id,
                    platform = %platform_row.platform,
                    latency_ms,
                    "platform healthy"
                );
                ProbeOutcome {
                    result: HealthCheckResult {
                        platform: platform_row.platform.clone(),
                        platform_id: platform_row.id.clone(),
                        healthy: true,
                        latency_ms,
                        error: None,
                        checked_at: Utc::now(),
                    },
                    viewers: session.viewer_count,
                }
            }
            Ok(Some(_)) => unhealthy(latency_ms, "session ended on platform".to_string()),
            Ok(None) => unhealthy(latency_ms, "session not found".to_string()),
            Err(error) => unhealthy(latency_ms, error.to_string()),
        }
    }

    /// Drive the LIVE → ERROR machine and the bounded recovery budget.
    async fn handle_unhealthy(
        &self,
        broadcast: &BroadcastDbModel,
        platform_row: &BroadcastPlatformDbModel,
        result: &HealthCheckResult,
    ) -> Result<()> {
        let error_text = result.error.as_deref().unwrap_or("health check failed");

        match platform_row.status() {
            Some(PlatformStatus::Live) => {
                let won = self
                    .broadcasts
                    .transition_platform_status(
                        &platform_row.id,
                        PlatformStatus::Live,
                        PlatformStatus::Error,
                        Some(error_text),
                    )
                    .await?;
                if !won {
                    debug!(
                        platform_id = %platform_row.id,
                        "lost the LIVE->ERROR transition, concurrent cycle handled it"
                    );
                    return Ok(());
                }
                warn!(
                    broadcast_id = %broadcast.id,
                    platform = %platform_row.platform,
                    error = error_text,
                    "platform went unhealthy"
                );
            }
            Some(PlatformStatus::Error) => {
                self.broadcasts
                    .set_platform_error(&platform_row.id, error_text)
                    .await?;
            }
            // Only LIVE connections are subject to the health machine;
            // PENDING/CONNECTED/ENDED rows are left alone.
            _ => return Ok(()),
        }

        let failures = self
            .broadcasts
            .increment_failure_count(&platform_row.id)
            .await?;

        if failures < self.config.max_retries {
            self.attempt_recovery(broadcast, platform_row).await?;
        } else if failures == self.config.max_retries {
            warn!(
                broadcast_id = %broadcast.id,
                platform = %platform_row.platform,
                failures,
                "recovery budget exhausted, escalating"
            );
            if let Some(platform) = platform_row.platform() {
                self.dispatcher
                    .platform_failure(&broadcast.id, platform, error_text, failures)
                    .await;
            }
        } else {
            // Terminal until manual intervention; the alert already fired.
            debug!(
                platform_id = %platform_row.id,
                failures,
                "platform remains in error, awaiting manual intervention"
            );
        }

        Ok(())
    }

    /// One delayed recovery probe; success restores LIVE and clears the slate.
    async fn attempt_recovery(
        &self,
        broadcast: &BroadcastDbModel,
        platform_row: &BroadcastPlatformDbModel,
    ) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(self.config.recovery_delay_ms)).await;

        let outcome = self.probe(broadcast, platform_row).await;
        if !outcome.result.healthy {
            debug!(
                platform_id = %platform_row.id,
                error = outcome.result.error.as_deref().unwrap_or(""),
                "recovery probe failed, platform stays in error"
            );
            return Ok(());
        }

        let won = self
            .broadcasts
            .transition_platform_status(
                &platform_row.id,
                PlatformStatus::Error,
                PlatformStatus::Live,
                None,
            )
            .await?;
        if won {
            self.broadcasts.reset_failure_count(&platform_row.id).await?;
            info!(
                broadcast_id = %broadcast.id,
                platform = %platform_row.platform,
                "platform recovered"
            );
        }
        Ok(())
    }

    /// Refresh a healthy LIVE platform's viewer count, returning it.
    async fn refresh_viewers(
        &self,
        platform_row: &BroadcastPlatformDbModel,
        outcome: &ProbeOutcome,
    ) -> Option<i64> {
        let viewers = match outcome.viewers {
            Some(viewers) => viewers,
            None => {
                let adapter = self.adapter_of(platform_row)?;
                let external_id = platform_row.external_id.as_deref()?;
                match adapter.viewer_count(external_id).await {
                    Ok(viewers) => viewers,
                    Err(error) => {
                        debug!(platform_id = %platform_row.id, %error, "viewer count unavailable");
                        return None;
                    }
                }
            }
        };

        let viewers = viewers as i64;
        if let Err(error) = self
            .broadcasts
            .update_platform_viewers(&platform_row.id, viewers)
            .await
        {
            warn!(platform_id = %platform_row.id, %error, "could not store viewer count");
        }
        Some(viewers)
    }

    /// Roll live viewer counts up to the broadcast and flag large swings.
    async fn aggregate_viewers(&self, broadcast: &BroadcastDbModel, current: i64) {
        let previous = broadcast.current_viewers;
        if previous > 0 && current != previous {
            let change_pct = (current - previous) as f64 * 100.0 / previous as f64;
            if change_pct >= self.config.viewer_spike_pct {
                self.dispatcher
                    .viewer_spike(&broadcast.id, previous, current)
                    .await;
            } else if change_pct <= -self.config.viewer_drop_pct {
                self.dispatcher
                    .viewer_drop(&broadcast.id, previous, current)
                    .await;
            }
        }

        let peak = broadcast.peak_viewers.max(current);
        if let Err(error) = self
            .broadcasts
            .update_broadcast_viewers(&broadcast.id, current, peak)
            .await
        {
            warn!(broadcast_id = %broadcast.id, %error, "could not store viewer aggregates");
        }
    }
}
