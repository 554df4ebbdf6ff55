//! Service configuration.
//!
//! All tunables live on explicit config structs with defaults; `AppConfig`
//! assembles them from the environment at startup. Nothing here is ambient:
//! every component receives its config by value at construction.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Stream health monitor tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMonitorConfig {
    /// Period between health cycles in milliseconds.
    pub check_interval_ms: u64,
    /// Delay before the in-cycle recovery probe in milliseconds.
    pub recovery_delay_ms: u64,
    /// Failed cycles per platform before recovery stops and an alert fires.
    pub max_retries: i32,
    /// Viewer increase (percent of previous) that counts as a spike.
    pub viewer_spike_pct: f64,
    /// Viewer decrease (percent of previous) that counts as a drop.
    pub viewer_drop_pct: f64,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 30_000,
            recovery_delay_ms: 5_000,
            max_retries: 3,
            viewer_spike_pct: 50.0,
            viewer_drop_pct: 50.0,
        }
    }
}

/// Stream quality monitor tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMonitorConfig {
    /// Period between quality cycles in milliseconds.
    pub check_interval_ms: u64,
    /// Per-metric alert bands.
    pub thresholds: QualityThresholds,
}

impl Default for QualityMonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 60_000,
            thresholds: QualityThresholds::default(),
        }
    }
}

/// One metric's three severity boundaries.
///
/// For floor metrics (bitrate, fps, buffer health) a value below `critical`
/// is critical and below `warning` is a warning; `optimal` is the boundary
/// under which the metric counts against the quality score. Ceiling metrics
/// (latency, packet loss) read the same fields in the opposite direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Band {
    pub critical: f64,
    pub warning: f64,
    pub optimal: f64,
}

/// Alert bands for every monitored quality metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Bitrate floor in kbps.
    pub bitrate_kbps: Band,
    /// Frame rate floor.
    pub fps: Band,
    /// End-to-end latency ceiling in milliseconds.
    pub latency_ms: Band,
    /// Packet loss ceiling in percent.
    pub packet_loss_pct: Band,
    /// Buffer health floor in percent.
    pub buffer_health_pct: Band,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            bitrate_kbps: Band {
                critical: 2500.0,
                warning: 3000.0,
                optimal: 5000.0,
            },
            fps: Band {
                critical: 24.0,
                warning: 28.0,
                optimal: 30.0,
            },
            latency_ms: Band {
                critical: 3000.0,
                warning: 2000.0,
                optimal: 1000.0,
            },
            packet_loss_pct: Band {
                critical: 5.0,
                warning: 2.0,
                optimal: 0.5,
            },
            buffer_health_pct: Band {
                critical: 50.0,
                warning: 70.0,
                optimal: 90.0,
            },
        }
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database URL.
    pub database_url: String,
    /// Emit JSON-formatted logs instead of the human formatter.
    pub log_json: bool,
    pub health: HealthMonitorConfig,
    pub quality: QualityMonitorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:castguard.db?mode=rwc".to_string(),
            log_json: false,
            health: HealthMonitorConfig::default(),
            quality: QualityMonitorConfig::default(),
        }
    }
}

impl AppConfig {
    /// Assemble configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }
        config.log_json = env_flag("CASTGUARD_LOG_JSON")?;

        if let Some(ms) = env_u64("HEALTH_CHECK_INTERVAL_MS")? {
            config.health.check_interval_ms = ms;
        }
        if let Some(ms) = env_u64("HEALTH_RECOVERY_DELAY_MS")? {
            config.health.recovery_delay_ms = ms;
        }
        if let Some(n) = env_u64("HEALTH_MAX_RETRIES")? {
            config.health.max_retries = n as i32;
        }
        if let Some(ms) = env_u64("QUALITY_CHECK_INTERVAL_MS")? {
            config.quality.check_interval_ms = ms;
        }

        Ok(config)
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| Error::config(format!("{name} must be an integer, got '{raw}'"))),
        Err(_) => Ok(None),
    }
}

fn env_flag(name: &str) -> Result<bool> {
    match std::env::var(name) {
        Ok(raw) => match raw.as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" | "" => Ok(false),
            other => Err(Error::config(format!(
                "{name} must be a boolean flag, got '{other}'"
            ))),
        },
        Err(_) => Ok(false),
    }
}
