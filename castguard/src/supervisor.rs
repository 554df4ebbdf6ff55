//! Process supervisor for the monitoring loops.
//!
//! Owns both monitors and runs one task per loop. Each loop ticks on its own
//! interval with missed ticks skipped, so a slow cycle finishes before the
//! next one of the same loop starts; the two loops still overlap each other
//! freely. Shutdown goes through a cancellation token.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::database::repositories::{AnalyticsRepository, BroadcastRepository};
use crate::monitor::health::HealthMonitor;
use crate::monitor::quality::QualityMonitor;

/// Supervises the health and quality monitoring loops.
pub struct MonitorSupervisor<BR, AR>
where
    BR: BroadcastRepository + 'static,
    AR: AnalyticsRepository + 'static,
{
    health: Arc<HealthMonitor<BR, AR>>,
    quality: Arc<QualityMonitor<BR, AR>>,
    cancellation: CancellationToken,
}

impl<BR, AR> MonitorSupervisor<BR, AR>
where
    BR: BroadcastRepository + 'static,
    AR: AnalyticsRepository + 'static,
{
    pub fn new(health: Arc<HealthMonitor<BR, AR>>, quality: Arc<QualityMonitor<BR, AR>>) -> Self {
        Self {
            health,
            quality,
            cancellation: CancellationToken::new(),
        }
    }

    /// Token observed by both loops; cancel it to stop them.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Spawn both monitoring loops, returning their task handles.
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        let health = self.health.clone();
        let health_token = self.cancellation.clone();
        let health_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(health.check_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("health monitor loop started");
            loop {
                tokio::select! {
                    _ = health_token.cancelled() => {
                        info!("health monitor loop stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        health.run_cycle().await;
                    }
                }
            }
        });

        let quality = self.quality.clone();
        let quality_token = self.cancellation.clone();
        let quality_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(quality.check_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("quality monitor loop started");
            loop {
                tokio::select! {
                    _ = quality_token.cancelled() => {
                        info!("quality monitor loop stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        quality.run_cycle().await;
                    }
                }
            }
        });

        vec![health_handle, quality_handle]
    }

    /// Signal both loops to stop after their current cycle.
    pub fn shutdown(&self) {
        self.cancellation.cancel();
    }
}
