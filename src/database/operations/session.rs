// 接近会话存储库

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::models::ProximitySession;
use crate::error::Result;
use crate::store::SessionLedger;

/// 接近会话存储库，处理 proximity_sessions 表的读写
pub struct SessionOperation {
    db: Arc<PgPool>,
}

impl SessionOperation {
    /// 创建新的会话存储库实例
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionLedger for SessionOperation {
    /// 创建未关闭的会话
    async fn open(&self, user_id: &str, peer_id: &str, start_time: i64) -> Result<Uuid> {
        let session_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO proximity_sessions (id, user_id, nearby_user_id, start_time)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .bind(peer_id)
        .bind(start_time)
        .execute(self.db.as_ref())
        .await
        .map_err(|e| {
            tracing::error!("创建接近会话失败: {}", e);
            e
        })?;

        Ok(session_id)
    }

    /// 关闭会话，只更新尚未关闭的记录
    async fn close(&self, session_id: Uuid, end_time: i64) -> Result<Option<ProximitySession>> {
        let session = sqlx::query_as::<_, ProximitySession>(
            r#"
            UPDATE proximity_sessions
            SET end_time = $2, duration_ms = $2 - start_time
            WHERE id = $1 AND end_time IS NULL
            RETURNING id, user_id, nearby_user_id, start_time, end_time, duration_ms
            "#,
        )
        .bind(session_id)
        .bind(end_time)
        .fetch_optional(self.db.as_ref())
        .await?;

        Ok(session)
    }

    async fn is_open(&self, session_id: Uuid) -> Result<bool> {
        let open: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM proximity_sessions
                WHERE id = $1 AND end_time IS NULL
            )
            "#,
        )
        .bind(session_id)
        .fetch_one(self.db.as_ref())
        .await?;

        Ok(open)
    }

    async fn session(&self, session_id: Uuid) -> Result<Option<ProximitySession>> {
        let session = sqlx::query_as::<_, ProximitySession>(
            r#"
            SELECT id, user_id, nearby_user_id, start_time, end_time, duration_ms
            FROM proximity_sessions
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(self.db.as_ref())
        .await?;

        Ok(session)
    }

    async fn sessions(
        &self,
        user_id: &str,
        peer_id: Option<&str>,
    ) -> Result<Vec<ProximitySession>> {
        let sessions = sqlx::query_as::<_, ProximitySession>(
            r#"
            SELECT id, user_id, nearby_user_id, start_time, end_time, duration_ms
            FROM proximity_sessions
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR nearby_user_id = $2)
            ORDER BY start_time DESC
            "#,
        )
        .bind(user_id)
        .bind(peer_id)
        .fetch_all(self.db.as_ref())
        .await?;

        Ok(sessions)
    }
}
