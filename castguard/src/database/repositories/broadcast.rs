//! Broadcast and broadcast-platform repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::database::models::{BroadcastDbModel, BroadcastPlatformDbModel, PlatformStatus};
use crate::database::time::now_ms;
use crate::{Error, Result};

/// Read/write access to broadcasts and their platform connections.
#[async_trait]
pub trait BroadcastRepository: Send + Sync {
    async fn get_broadcast(&self, id: &str) -> Result<BroadcastDbModel>;
    async fn list_live_broadcasts(&self) -> Result<Vec<BroadcastDbModel>>;
    /// Platforms of a broadcast in stable insertion order.
    async fn list_platforms(&self, broadcast_id: &str) -> Result<Vec<BroadcastPlatformDbModel>>;
    async fn get_platform(&self, id: &str) -> Result<BroadcastPlatformDbModel>;

    /// Compare-and-set status transition.
    ///
    /// The row moves from `expected` to `next` (writing `error` as the last
    /// error text) only if its status still is `expected`; returns whether
    /// this caller won the transition. Concurrent cycles race on this, and
    /// the loser must not clobber the winner's write.
    async fn transition_platform_status(
        &self,
        id: &str,
        expected: PlatformStatus,
        next: PlatformStatus,
        error: Option<&str>,
    ) -> Result<bool>;

    /// Bump the consecutive failure counter, returning the new value.
    async fn increment_failure_count(&self, id: &str) -> Result<i32>;
    /// Zero the failure counter and clear the last error.
    async fn reset_failure_count(&self, id: &str) -> Result<()>;
    async fn set_platform_error(&self, id: &str, error: &str) -> Result<()>;
    async fn update_platform_viewers(&self, id: &str, count: i64) -> Result<()>;
    async fn update_broadcast_viewers(&self, id: &str, current: i64, peak: i64) -> Result<()>;
}

/// SQLx implementation of [`BroadcastRepository`].
pub struct SqlxBroadcastRepository {
    pool: SqlitePool,
}

impl SqlxBroadcastRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BroadcastRepository for SqlxBroadcastRepository {
    async fn get_broadcast(&self, id: &str) -> Result<BroadcastDbModel> {
        sqlx::query_as::<_, BroadcastDbModel>("SELECT * FROM broadcasts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::not_found("Broadcast", id))
    }

    async fn list_live_broadcasts(&self) -> Result<Vec<BroadcastDbModel>> {
        let broadcasts = sqlx::query_as::<_, BroadcastDbModel>(
            "SELECT * FROM broadcasts WHERE status = 'LIVE' ORDER BY scheduled_start, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(broadcasts)
    }

    async fn list_platforms(&self, broadcast_id: &str) -> Result<Vec<BroadcastPlatformDbModel>> {
        let platforms = sqlx::query_as::<_, BroadcastPlatformDbModel>(
            "SELECT * FROM broadcast_platforms WHERE broadcast_id = ? ORDER BY created_at, id",
        )
        .bind(broadcast_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(platforms)
    }

    async fn get_platform(&self, id: &str) -> Result<BroadcastPlatformDbModel> {
        sqlx::query_as::<_, BroadcastPlatformDbModel>(
            "SELECT * FROM broadcast_platforms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("BroadcastPlatform", id))
    }

    async fn transition_platform_status(
        &self,
        id: &str,
        expected: PlatformStatus,
        next: PlatformStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE broadcast_platforms
            SET status = ?, last_error = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(next.as_str())
        .bind(error)
        .bind(now_ms())
        .bind(id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn increment_failure_count(&self, id: &str) -> Result<i32> {
        sqlx::query(
            "UPDATE broadcast_platforms SET failure_count = failure_count + 1, updated_at = ? WHERE id = ?",
        )
        .bind(now_ms())
        .bind(id)
        .execute(&self.pool)
        .await?;

        let result: (i32,) =
            sqlx::query_as("SELECT failure_count FROM broadcast_platforms WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(result.0)
    }

    async fn reset_failure_count(&self, id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE broadcast_platforms SET failure_count = 0, last_error = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(now_ms())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_platform_error(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query("UPDATE broadcast_platforms SET last_error = ?, updated_at = ? WHERE id = ?")
            .bind(error)
            .bind(now_ms())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_platform_viewers(&self, id: &str, count: i64) -> Result<()> {
        sqlx::query("UPDATE broadcast_platforms SET viewer_count = ?, updated_at = ? WHERE id = ?")
            .bind(count)
            .bind(now_ms())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_broadcast_viewers(&self, id: &str, current: i64, peak: i64) -> Result<()> {
        sqlx::query(
            "UPDATE broadcasts SET current_viewers = ?, peak_viewers = ?, updated_at = ? WHERE id = ?",
        )
        .bind(current)
        .bind(peak)
        .bind(now_ms())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use platform_adapters::Platform;

    use crate::database::memory_pool;
    use crate::database::models::BroadcastStatus;

    async fn seeded_repo() -> (SqlxBroadcastRepository, String, String) {
        let pool = memory_pool().await;
        let repo = SqlxBroadcastRepository::new(pool.clone());

        let mut broadcast = BroadcastDbModel::new("Test stream", now_ms(), "org-1");
        broadcast.status = BroadcastStatus::Live.as_str().to_string();
        sqlx::query(
            r#"
            INSERT INTO broadcasts (
                id, title, scheduled_start, scheduled_end, status,
                current_viewers, peak_viewers, organisation_id, branch_id,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&broadcast.id)
        .bind(&broadcast.title)
        .bind(broadcast.scheduled_start)
        .bind(broadcast.scheduled_end)
        .bind(&broadcast.status)
        .bind(broadcast.current_viewers)
        .bind(broadcast.peak_viewers)
        .bind(&broadcast.organisation_id)
        .bind(&broadcast.branch_id)
        .bind(broadcast.created_at)
        .bind(broadcast.updated_at)
        .execute(&pool)
        .await
        .unwrap();

        let mut platform = BroadcastPlatformDbModel::new(&broadcast.id, Platform::Zoom);
        platform.status = PlatformStatus::Live.as_str().to_string();
        platform.external_id = Some("42".into());
        sqlx::query(
            r#"
            INSERT INTO broadcast_platforms (
                id, broadcast_id, platform, external_id, stream_url, status,
                last_error, failure_count, viewer_count, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&platform.id)
        .bind(&platform.broadcast_id)
        .bind(&platform.platform)
        .bind(&platform.external_id)
        .bind(&platform.stream_url)
        .bind(&platform.status)
        .bind(&platform.last_error)
        .bind(platform.failure_count)
        .bind(platform.viewer_count)
        .bind(platform.created_at)
        .bind(platform.updated_at)
        .execute(&pool)
        .await
        .unwrap();

        (repo, broadcast.id, platform.id)
    }

    #[tokio::test]
    async fn test_list_live_broadcasts() {
        let (repo, broadcast_id, _) = seeded_repo().await;
        let live = repo.list_live_broadcasts().await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, broadcast_id);
    }

    #[tokio::test]
    async fn test_cas_transition_wins_once() {
        let (repo, _, platform_id) = seeded_repo().await;

        let won = repo
            .transition_platform_status(
                &platform_id,
                PlatformStatus::Live,
                PlatformStatus::Error,
                Some("session not found"),
            )
            .await
            .unwrap();
        assert!(won);

        // A second caller expecting LIVE loses: the row already moved.
        let won_again = repo
            .transition_platform_status(
                &platform_id,
                PlatformStatus::Live,
                PlatformStatus::Error,
                Some("stale"),
            )
            .await
            .unwrap();
        assert!(!won_again);

        let platform = repo.get_platform(&platform_id).await.unwrap();
        assert_eq!(platform.status, "ERROR");
        assert_eq!(platform.last_error.as_deref(), Some("session not found"));
    }

    #[tokio::test]
    async fn test_failure_counter_round_trip() {
        let (repo, _, platform_id) = seeded_repo().await;

        assert_eq!(repo.increment_failure_count(&platform_id).await.unwrap(), 1);
        assert_eq!(repo.increment_failure_count(&platform_id).await.unwrap(), 2);

        repo.set_platform_error(&platform_id, "stream stalled")
            .await
            .unwrap();
        repo.reset_failure_count(&platform_id).await.unwrap();

        let platform = repo.get_platform(&platform_id).await.unwrap();
        assert_eq!(platform.failure_count, 0);
        assert!(platform.last_error.is_none());
    }

    #[tokio::test]
    async fn test_viewer_updates() {
        let (repo, broadcast_id, platform_id) = seeded_repo().await;

        repo.update_platform_viewers(&platform_id, 120).await.unwrap();
        repo.update_broadcast_viewers(&broadcast_id, 120, 180)
            .await
            .unwrap();

        let platform = repo.get_platform(&platform_id).await.unwrap();
        assert_eq!(platform.viewer_count, 120);
        let broadcast = repo.get_broadcast(&broadcast_id).await.unwrap();
        assert_eq!(broadcast.current_viewers, 120);
        assert_eq!(broadcast.peak_viewers, 180);
    }
}
