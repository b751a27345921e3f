use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use config::TrackerConfig;
use store::{SystemClock, TrackerStores};
use tracker::ProximityTracker;

pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod store;
pub mod tracker;
pub mod utils;

pub use error::{Result, TrackerError};

/// 用 Redis 与 Postgres 实现组装追踪器
pub fn build_tracker(
    pool: PgPool,
    redis: Arc<RedisClient>,
    config: TrackerConfig,
) -> ProximityTracker {
    let db = Arc::new(pool);
    let stores = TrackerStores {
        locations: Arc::new(cache::LocationCacheOperations::new(redis.clone())),
        state: Arc::new(cache::ProximityCacheOperations::new(redis.clone())),
        ephemeral: Arc::new(cache::TotalTimeCacheOperations::new(redis)),
        ledger: Arc::new(database::SessionOperation::new(db.clone())),
        totals: Arc::new(database::TotalOperation::new(db.clone())),
        relations: Arc::new(database::RelationOperation::new(db.clone())),
        scores: Arc::new(database::ScoreOperation::new(db)),
        clock: Arc::new(SystemClock),
    };
    ProximityTracker::new(stores, config)
}
