//! 追踪器依赖的存储接口
//!
//! 每个 trait 都有 Redis 或 Postgres 实现（`cache::operations`、`database::operations`），
//! 以及 [`memory`] 中的内存实现。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::cache::models::{NearbySnapshot, PairState};
use crate::database::models::{
    ProximitySession, ProximityStats, RelatedUser, RelationChange, ScoreComponents,
    UserProximityTotal,
};
use crate::error::Result;
use crate::models::{NearbyUser, PairKey};
use crate::utils::now_millis;

pub mod memory;

/// 用户最新位置的地理索引
#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn set_position(&self, user_id: &str, longitude: f64, latitude: f64) -> Result<()>;

    async fn list_known_users(&self) -> Result<Vec<String>>;

    /// 距离 `user_id` 在 `radius_m` 米以内的用户，结果可能包含自己
    async fn nearby(&self, user_id: &str, radius_m: f64) -> Result<Vec<NearbyUser>>;
}

/// 扫描用的临时状态：用户对接近状态，以及每个用户上一轮的附近快照
#[async_trait]
pub trait ProximityStateStore: Send + Sync {
    async fn get_pair(&self, pair: &PairKey) -> Result<Option<PairState>>;

    async fn put_pair(&self, pair: &PairKey, state: &PairState, ttl: Duration) -> Result<()>;

    /// 延长已有条目的过期时间，条目不存在时返回 false
    async fn touch_pair(&self, pair: &PairKey, ttl: Duration) -> Result<bool>;

    async fn delete_pair(&self, pair: &PairKey) -> Result<()>;

    async fn load_nearby(&self, user_id: &str) -> Result<Option<NearbySnapshot>>;

    /// 替换快照，空快照直接删除
    async fn replace_nearby(
        &self,
        user_id: &str,
        snapshot: &NearbySnapshot,
        ttl: Duration,
    ) -> Result<()>;
}

/// 尚未汇总的用户对累计时间
///
/// `add` 与 `consume` 对同一个键必须是原子的，汇总器读取之后新增的时间不能丢失。
#[async_trait]
pub trait EphemeralTotals: Send + Sync {
    /// 累加一个已关闭会话的时长。同一会话只计入一次，重复调用返回 false
    async fn add(&self, pair: &PairKey, session_id: Uuid, duration_ms: i64) -> Result<bool>;

    async fn pending(&self) -> Result<Vec<(PairKey, i64)>>;

    /// 扣除已写入数据库的 `amount_ms`，剩余为 0 时删除条目，返回剩余值
    async fn consume(&self, pair: &PairKey, amount_ms: i64) -> Result<i64>;
}

/// 接近会话账本
#[async_trait]
pub trait SessionLedger: Send + Sync {
    async fn open(&self, user_id: &str, peer_id: &str, start_time: i64) -> Result<Uuid>;

    /// 关闭会话。会话不存在或已关闭时返回 `None`，已关闭的会话不会被修改
    async fn close(&self, session_id: Uuid, end_time: i64) -> Result<Option<ProximitySession>>;

    async fn is_open(&self, session_id: Uuid) -> Result<bool>;

    async fn session(&self, session_id: Uuid) -> Result<Option<ProximitySession>>;

    /// 用户的会话，可限定某个对方用户，按开始时间倒序
    async fn sessions(&self, user_id: &str, peer_id: Option<&str>)
    -> Result<Vec<ProximitySession>>;
}

/// 用户对的长期累计时间
#[async_trait]
pub trait ProximityTotals: Send + Sync {
    /// 累加时长、会话数加一，返回更新后的记录
    async fn add_duration(
        &self,
        pair: &PairKey,
        duration_ms: i64,
        at: DateTime<Utc>,
    ) -> Result<UserProximityTotal>;

    async fn total(&self, pair: &PairKey) -> Result<Option<UserProximityTotal>>;

    async fn totals_for_user(&self, user_id: &str) -> Result<Vec<UserProximityTotal>>;

    async fn stats(&self, user_id: &str) -> Result<ProximityStats>;
}

#[async_trait]
pub trait RelationStore: Send + Sync {
    async fn find_related(&self, pair: &PairKey) -> Result<Option<RelatedUser>>;

    /// 不存在则创建，否则刷新累计时间
    async fn upsert_related(&self, pair: &PairKey, spent_time_ms: i64) -> Result<RelationChange>;

    async fn related_users(&self, user_id: &str) -> Result<Vec<RelatedUser>>;
}

/// 用户分数：其余分项由应用其他部分维护，这里只写关系分
#[async_trait]
pub trait ScoreStore: Send + Sync {
    async fn components(&self, user_id: &str) -> Result<Option<ScoreComponents>>;

    async fn relation_score(&self, user_id: &str) -> Result<Option<i32>>;

    async fn set_relation_score(&self, user_id: &str, score: i32) -> Result<()>;
}

pub trait Clock: Send + Sync {
    /// Unix 时间戳（毫秒）
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        now_millis()
    }
}

/// 追踪器依赖的全部存储
#[derive(Clone)]
pub struct TrackerStores {
    pub locations: Arc<dyn LocationStore>,
    pub state: Arc<dyn ProximityStateStore>,
    pub ephemeral: Arc<dyn EphemeralTotals>,
    pub ledger: Arc<dyn SessionLedger>,
    pub totals: Arc<dyn ProximityTotals>,
    pub relations: Arc<dyn RelationStore>,
    pub scores: Arc<dyn ScoreStore>,
    pub clock: Arc<dyn Clock>,
}
