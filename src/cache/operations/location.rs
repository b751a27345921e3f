use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};

use crate::cache::keys::USER_GEO_KEY;
use crate::error::Result;
use crate::models::NearbyUser;
use crate::store::LocationStore;

/// 用户位置缓存操作
pub struct LocationCacheOperations {
    redis_client: Arc<RedisClient>,
}

impl LocationCacheOperations {
    /// 创建新的位置缓存操作实例
    pub fn new(redis_client: Arc<RedisClient>) -> Self {
        Self { redis_client }
    }
}

#[async_trait]
impl LocationStore for LocationCacheOperations {
    /// 写入用户当前位置
    async fn set_position(&self, user_id: &str, longitude: f64, latitude: f64) -> Result<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let _: () = redis::cmd("GEOADD")
            .arg(USER_GEO_KEY)
            .arg(longitude)
            .arg(latitude)
            .arg(user_id)
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    /// 所有有位置记录的用户
    async fn list_known_users(&self) -> Result<Vec<String>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        // GEO 索引本身是一个有序集合
        let users: Vec<String> = conn.zrange(USER_GEO_KEY, 0, -1).await?;
        Ok(users)
    }

    /// 以用户当前位置为中心查找附近用户
    async fn nearby(&self, user_id: &str, radius_m: f64) -> Result<Vec<NearbyUser>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;

        let rows: Vec<(String, f64, (f64, f64))> = redis::cmd("GEOSEARCH")
            .arg(USER_GEO_KEY)
            .arg("FROMMEMBER")
            .arg(user_id)
            .arg("BYRADIUS")
            .arg(radius_m)
            .arg("m")
            .arg("WITHDIST")
            .arg("WITHCOORD")
            .arg("ASC")
            .query_async(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, distance_m, (longitude, latitude))| NearbyUser {
                user_id: id,
                distance_m,
                longitude,
                latitude,
            })
            .collect())
    }
}
