// 累计接近时间存储库

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::database::models::{ProximityStats, UserProximityTotal};
use crate::error::Result;
use crate::models::PairKey;
use crate::store::ProximityTotals;

/// 累计时间存储库，处理 user_proximity_totals 表的读写
pub struct TotalOperation {
    db: Arc<PgPool>,
}

impl TotalOperation {
    /// 创建新的累计时间存储库实例
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProximityTotals for TotalOperation {
    /// 原子累加，单条语句完成插入或更新
    async fn add_duration(
        &self,
        pair: &PairKey,
        duration_ms: i64,
        at: DateTime<Utc>,
    ) -> Result<UserProximityTotal> {
        let total = sqlx::query_as::<_, UserProximityTotal>(
            r#"
            INSERT INTO user_proximity_totals (
                user_id, nearby_user_id, total_duration_ms, session_count, last_session_at
            )
            VALUES ($1, $2, $3, 1, $4)
            ON CONFLICT (user_id, nearby_user_id) DO UPDATE
            SET total_duration_ms = user_proximity_totals.total_duration_ms + EXCLUDED.total_duration_ms,
                session_count = user_proximity_totals.session_count + 1,
                last_session_at = EXCLUDED.last_session_at
            RETURNING user_id, nearby_user_id, total_duration_ms, session_count, last_session_at
            "#,
        )
        .bind(&pair.user_id)
        .bind(&pair.peer_id)
        .bind(duration_ms)
        .bind(at)
        .fetch_one(self.db.as_ref())
        .await
        .map_err(|e| {
            tracing::error!("更新累计接近时间失败 {}: {}", pair, e);
            e
        })?;

        Ok(total)
    }

    async fn total(&self, pair: &PairKey) -> Result<Option<UserProximityTotal>> {
        let total = sqlx::query_as::<_, UserProximityTotal>(
            r#"
            SELECT user_id, nearby_user_id, total_duration_ms, session_count, last_session_at
            FROM user_proximity_totals
            WHERE user_id = $1 AND nearby_user_id = $2
            "#,
        )
        .bind(&pair.user_id)
        .bind(&pair.peer_id)
        .fetch_optional(self.db.as_ref())
        .await?;

        Ok(total)
    }

    async fn totals_for_user(&self, user_id: &str) -> Result<Vec<UserProximityTotal>> {
        let totals = sqlx::query_as::<_, UserProximityTotal>(
            r#"
            SELECT user_id, nearby_user_id, total_duration_ms, session_count, last_session_at
            FROM user_proximity_totals
            WHERE user_id = $1
            ORDER BY total_duration_ms DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.as_ref())
        .await?;

        Ok(totals)
    }

    async fn stats(&self, user_id: &str) -> Result<ProximityStats> {
        let stats = sqlx::query_as::<_, ProximityStats>(
            r#"
            SELECT
                COALESCE(SUM(total_duration_ms), 0)::BIGINT AS total_time_ms,
                COALESCE(SUM(session_count), 0)::BIGINT AS total_sessions,
                COUNT(nearby_user_id)::BIGINT AS unique_contacts,
                MAX(last_session_at) AS last_session_at
            FROM user_proximity_totals
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.db.as_ref())
        .await?;

        Ok(stats)
    }
}
