// 关系用户存储库

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::models::{RelatedUser, RelationChange};
use crate::error::Result;
use crate::models::PairKey;
use crate::store::RelationStore;

/// 关系用户存储库，处理 related_users 表的读写
pub struct RelationOperation {
    db: Arc<PgPool>,
}

impl RelationOperation {
    /// 创建新的关系用户存储库实例
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RelationStore for RelationOperation {
    async fn find_related(&self, pair: &PairKey) -> Result<Option<RelatedUser>> {
        let related = sqlx::query_as::<_, RelatedUser>(
            r#"
            SELECT user_id, related_user_id, spent_time_ms
            FROM related_users
            WHERE user_id = $1 AND related_user_id = $2
            "#,
        )
        .bind(&pair.user_id)
        .bind(&pair.peer_id)
        .fetch_optional(self.db.as_ref())
        .await?;

        Ok(related)
    }

    /// 主键冲突时只刷新时间，同一用户对永远只有一行
    async fn upsert_related(&self, pair: &PairKey, spent_time_ms: i64) -> Result<RelationChange> {
        // xmax = 0 表示本次是插入
        let created: bool = sqlx::query_scalar(
            r#"
            INSERT INTO related_users (user_id, related_user_id, spent_time_ms)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, related_user_id) DO UPDATE
            SET spent_time_ms = EXCLUDED.spent_time_ms, updated_at = NOW()
            RETURNING (xmax = 0) AS created
            "#,
        )
        .bind(&pair.user_id)
        .bind(&pair.peer_id)
        .bind(spent_time_ms)
        .fetch_one(self.db.as_ref())
        .await?;

        Ok(if created {
            RelationChange::Created
        } else {
            RelationChange::Updated
        })
    }

    async fn related_users(&self, user_id: &str) -> Result<Vec<RelatedUser>> {
        let related = sqlx::query_as::<_, RelatedUser>(
            r#"
            SELECT user_id, related_user_id, spent_time_ms
            FROM related_users
            WHERE user_id = $1
            ORDER BY spent_time_ms DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db.as_ref())
        .await?;

        Ok(related)
    }
}
