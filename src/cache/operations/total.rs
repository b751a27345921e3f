use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient, Script};
use uuid::Uuid;

use crate::cache::keys::{
    TOTAL_TIME_PATTERN, accrued_session_key, parse_total_time_key, total_time_key,
};
use crate::error::Result;
use crate::models::PairKey;
use crate::store::EphemeralTotals;

/// 会话标记不存在时写入标记并累加时长，已存在时不做任何修改
const ADD_SCRIPT: &str = r#"
if redis.call('SET', KEYS[2], '1', 'NX', 'EX', ARGV[2]) then
    redis.call('INCRBY', KEYS[1], ARGV[1])
    return 1
end
return 0
"#;

/// 会话标记保留 1 天，远长于接近状态的过期时间
const ACCRUED_MARKER_TTL_SECS: u64 = 86_400;

/// 扣除已汇总的部分，剩余不大于 0 时删除键；整个过程在 Redis 内原子执行
const CONSUME_SCRIPT: &str = r#"
local remaining = redis.call('DECRBY', KEYS[1], ARGV[1])
if remaining <= 0 then
    redis.call('DEL', KEYS[1])
    return 0
end
return remaining
"#;

/// 未汇总累计时间缓存操作
pub struct TotalTimeCacheOperations {
    redis_client: Arc<RedisClient>,
    add_script: Script,
    consume_script: Script,
}

impl TotalTimeCacheOperations {
    /// 创建新的累计时间缓存操作实例
    pub fn new(redis_client: Arc<RedisClient>) -> Self {
        Self {
            redis_client,
            add_script: Script::new(ADD_SCRIPT),
            consume_script: Script::new(CONSUME_SCRIPT),
        }
    }
}

#[async_trait]
impl EphemeralTotals for TotalTimeCacheOperations {
    async fn add(&self, pair: &PairKey, session_id: Uuid, duration_ms: i64) -> Result<bool> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let added: i64 = self
            .add_script
            .key(total_time_key(pair))
            .key(accrued_session_key(&session_id))
            .arg(duration_ms)
            .arg(ACCRUED_MARKER_TTL_SECS)
            .invoke_async(&mut conn)
            .await?;
        Ok(added == 1)
    }

    async fn pending(&self) -> Result<Vec<(PairKey, i64)>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let keys: Vec<String> = conn.keys(TOTAL_TIME_PATTERN).await?;
        let mut pending = Vec::with_capacity(keys.len());

        for key in keys {
            let Some(pair) = parse_total_time_key(&key) else {
                tracing::warn!("Skipping malformed total time key: {}", key);
                continue;
            };
            // 键可能在 KEYS 之后被删除
            let value: Option<i64> = conn.get(&key).await?;
            if let Some(value) = value {
                pending.push((pair, value));
            }
        }

        Ok(pending)
    }

    async fn consume(&self, pair: &PairKey, amount_ms: i64) -> Result<i64> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let remaining: i64 = self
            .consume_script
            .key(total_time_key(pair))
            .arg(amount_ms)
            .invoke_async(&mut conn)
            .await?;
        Ok(remaining)
    }
}
