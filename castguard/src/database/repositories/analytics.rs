//! Append-only analytics repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::{AlertRecordDbModel, HealthRecordDbModel, QualityRecordDbModel};

/// Append-only store for monitoring analytics rows.
#[async_trait]
pub trait AnalyticsRepository: Send + Sync {
    async fn append_health(&self, record: &HealthRecordDbModel) -> Result<()>;
    /// Health rows for one platform since an epoch-ms cutoff, oldest first.
    async fn health_since(
        &self,
        platform_id: &str,
        since_ms: i64,
    ) -> Result<Vec<HealthRecordDbModel>>;

    async fn append_quality(&self, record: &QualityRecordDbModel) -> Result<()>;
    async fn quality_since(
        &self,
        platform_id: &str,
        since_ms: i64,
    ) -> Result<Vec<QualityRecordDbModel>>;

    async fn append_alert(&self, record: &AlertRecordDbModel) -> Result<()>;
}

/// SQLx implementation of [`AnalyticsRepository`].
pub struct SqlxAnalyticsRepository {
    pool: SqlitePool,
}

impl SqlxAnalyticsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalyticsRepository for SqlxAnalyticsRepository {
    async fn append_health(&self, record: &HealthRecordDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO health_records (
                id, broadcast_id, platform_id, platform, healthy,
                latency_ms, error, checked_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.broadcast_id)
        .bind(&record.platform_id)
        .bind(&record.platform)
        .bind(record.healthy)
        .bind(record.latency_ms)
        .bind(&record.error)
        .bind(record.checked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn health_since(
        &self,
        platform_id: &str,
        since_ms: i64,
    ) -> Result<Vec<HealthRecordDbModel>> {
        let records = sqlx::query_as::<_, HealthRecordDbModel>(
            "SELECT * FROM health_records WHERE platform_id = ? AND checked_at >= ? ORDER BY checked_at",
        )
        .bind(platform_id)
        .bind(since_ms)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn append_quality(&self, record: &QualityRecordDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO quality_records (
                id, broadcast_id, platform_id, platform, bitrate_kbps, fps,
                resolution, dropped_frames, buffer_health_pct, latency_ms,
                jitter_ms, packet_loss_pct, score, checked_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.broadcast_id)
        .bind(&record.platform_id)
        .bind(&record.platform)
        .bind(record.bitrate_kbps)
        .bind(record.fps)
        .bind(&record.resolution)
        .bind(record.dropped_frames)
        .bind(record.buffer_health_pct)
        .bind(record.latency_ms)
        .bind(record.jitter_ms)
        .bind(record.packet_loss_pct)
        .bind(record.score)
        .bind(record.checked_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn quality_since(
        &self,
        platform_id: &str,
        since_ms: i64,
    ) -> Result<Vec<QualityRecordDbModel>> {
        let records = sqlx::query_as::<_, QualityRecordDbModel>(
            "SELECT * FROM quality_records WHERE platform_id = ? AND checked_at >= ? ORDER BY checked_at",
        )
        .bind(platform_id)
        .bind(since_ms)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn append_alert(&self, record: &AlertRecordDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alert_records (
                id, alert_type, severity, title, broadcast_id, platform, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.alert_type)
        .bind(&record.severity)
        .bind(&record.title)
        .bind(&record.broadcast_id)
        .bind(&record.platform)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
