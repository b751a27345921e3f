//! 接近追踪与关系评分
//!
//! [`ProximityTracker`] 持有全部存储的注入实现，对外提供：
//! - `sweep`：每个周期对比附近快照，产生 enter / continue / exit 事件
//! - `aggregate`：把未汇总的累计时间写入数据库，并在超过阈值时提升为关系用户
//! - `recompute_relation_score`：根据关系用户的总分重算关系分
//! - 查询接口：会话历史、累计统计、关系用户列表

use std::future::Future;

use tracing::warn;

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::store::TrackerStores;

mod aggregator;
mod locks;
mod promoter;
mod report;
mod scorer;
pub mod state;
mod sweeper;

pub use aggregator::AggregateReport;
pub use locks::PairLocks;
pub use report::{PairHistory, UserHistory};
pub use scorer::relation_score_from_totals;
pub use sweeper::{PairOutcome, SweepReport, UserSweep};

pub struct ProximityTracker {
    stores: TrackerStores,
    config: TrackerConfig,
    locks: PairLocks,
}

impl ProximityTracker {
    pub fn new(stores: TrackerStores, config: TrackerConfig) -> Self {
        Self {
            stores,
            config,
            locks: PairLocks::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn stores(&self) -> &TrackerStores {
        &self.stores
    }

    /// 写入用户当前位置
    pub async fn update_position(&self, user_id: &str, longitude: f64, latitude: f64) -> Result<()> {
        if !(-180.0..=180.0).contains(&longitude) || !(-85.05112878..=85.05112878).contains(&latitude)
        {
            return Err(TrackerError::InvalidPosition {
                longitude,
                latitude,
            });
        }
        self.bounded("set position", self.stores.locations.set_position(user_id, longitude, latitude))
            .await
    }

    fn now_ms(&self) -> i64 {
        self.stores.clock.now_ms()
    }

    /// 为单次存储调用加超时，超时按失败处理
    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.operation_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Store call timed out: {}", operation);
                Err(TrackerError::Timeout {
                    operation: operation.to_string(),
                })
            }
        }
    }
}
