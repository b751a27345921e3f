use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};

use crate::cache::keys::{nearby_snapshot_key, pair_state_key};
use crate::cache::models::{NearbySnapshot, PairState};
use crate::error::Result;
use crate::models::PairKey;
use crate::store::ProximityStateStore;

/// 用户对接近状态缓存操作
pub struct ProximityCacheOperations {
    redis_client: Arc<RedisClient>,
}

impl ProximityCacheOperations {
    /// 创建新的接近状态缓存操作实例
    pub fn new(redis_client: Arc<RedisClient>) -> Self {
        Self { redis_client }
    }
}

// Redis 过期时间至少 1 秒
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl ProximityStateStore for ProximityCacheOperations {
    async fn get_pair(&self, pair: &PairKey) -> Result<Option<PairState>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let result: Option<String> = conn.get(pair_state_key(pair)).await?;
        match result {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put_pair(&self, pair: &PairKey, state: &PairState, ttl: Duration) -> Result<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let json = serde_json::to_string(state)?;
        let _: () = conn.set_ex(pair_state_key(pair), json, ttl_secs(ttl)).await?;
        Ok(())
    }

    async fn touch_pair(&self, pair: &PairKey, ttl: Duration) -> Result<bool> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let refreshed: bool = conn
            .expire(pair_state_key(pair), ttl_secs(ttl) as i64)
            .await?;
        Ok(refreshed)
    }

    async fn delete_pair(&self, pair: &PairKey) -> Result<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let _: () = conn.del(pair_state_key(pair)).await?;
        Ok(())
    }

    async fn load_nearby(&self, user_id: &str) -> Result<Option<NearbySnapshot>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let result: Option<String> = conn.get(nearby_snapshot_key(user_id)).await?;
        match result {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn replace_nearby(
        &self,
        user_id: &str,
        snapshot: &NearbySnapshot,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let key = nearby_snapshot_key(user_id);
        if snapshot.peers.is_empty() {
            let _: () = conn.del(key).await?;
        } else {
            // 快照带过期时间，用户停止上报位置后旧状态会自动清除
            let json = serde_json::to_string(snapshot)?;
            let _: () = conn.set_ex(key, json, ttl_secs(ttl)).await?;
        }
        Ok(())
    }
}
