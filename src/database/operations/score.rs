// 用户分数存储库
// users 与 other_scores 由应用其他部分维护，这里只读；relation_scores 由本服务写入

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::models::{RelationScore, ScoreComponents};
use crate::error::Result;
use crate::store::ScoreStore;

pub struct ScoreOperation {
    db: Arc<PgPool>,
}

impl ScoreOperation {
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ScoreStore for ScoreOperation {
    /// 读取用户已保存的各项分数，不做任何重算
    async fn components(&self, user_id: &str) -> Result<Option<ScoreComponents>> {
        let components = sqlx::query_as::<_, ScoreComponents>(
            r#"
            SELECT
                u.id AS user_id,
                COALESCE(rs.score, 0)::BIGINT AS relation_score,
                u.criminal_score::BIGINT AS criminal_score,
                COALESCE(
                    (SELECT SUM(o.score) FROM other_scores o WHERE o.user_id = u.id),
                    0
                )::BIGINT AS other_score,
                u.rating_score::BIGINT AS rating_score
            FROM users u
            LEFT JOIN relation_scores rs ON rs.user_id = u.id
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.db.as_ref())
        .await?;

        Ok(components)
    }

    async fn relation_score(&self, user_id: &str) -> Result<Option<i32>> {
        let row = sqlx::query_as::<_, RelationScore>(
            "SELECT user_id, score FROM relation_scores WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.as_ref())
        .await?;

        Ok(row.map(|r| r.score))
    }

    async fn set_relation_score(&self, user_id: &str, score: i32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO relation_scores (user_id, score, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET score = EXCLUDED.score, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(score)
        .execute(self.db.as_ref())
        .await?;

        Ok(())
    }
}
