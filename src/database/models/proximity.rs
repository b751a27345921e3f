use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// 接近会话数据库实体
///
/// 打开时 end_time 与 duration_ms 为空；关闭后不再修改，且 duration_ms = end_time - start_time。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ProximitySession {
    pub id: Uuid,
    pub user_id: String,
    pub nearby_user_id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub duration_ms: Option<i64>,
}

impl ProximitySession {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// 用户对累计接近时间
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserProximityTotal {
    pub user_id: String,
    pub nearby_user_id: String,
    pub total_duration_ms: i64,
    pub session_count: i32,
    pub last_session_at: DateTime<Utc>,
}

/// 关系用户：累计接近时间超过阈值后产生
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RelatedUser {
    pub user_id: String,
    pub related_user_id: String,
    pub spent_time_ms: i64,
}

/// 关系用户写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationChange {
    Created,
    Updated,
}

/// 关系分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RelationScore {
    pub user_id: String,
    pub score: i32,
}

/// 用户当前已保存的各项分数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ScoreComponents {
    pub user_id: String,
    pub relation_score: i64,
    pub criminal_score: i64,
    pub other_score: i64,
    pub rating_score: i64,
}

impl ScoreComponents {
    pub fn total(&self) -> i64 {
        self.relation_score + self.criminal_score + self.other_score + self.rating_score
    }
}

/// 用户接近统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ProximityStats {
    pub total_time_ms: i64,
    pub total_sessions: i64,
    pub unique_contacts: i64,
    pub last_session_at: Option<DateTime<Utc>>,
}
