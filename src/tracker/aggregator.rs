use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::ProximityTracker;
use crate::database::models::RelationChange;
use crate::error::Result;
use crate::models::PairKey;

/// 一轮汇总的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateReport {
    pub pending: usize,
    pub flushed: usize,
    pub flushed_ms: i64,
    pub skipped: usize,
    pub promoted: usize,
    pub refreshed: usize,
    pub failed: usize,
}

impl ProximityTracker {
    /// 把未汇总的累计时间写入数据库
    ///
    /// 先写数据库，成功后再从临时计数中扣除同样的数值：写入失败时计数保留到下一轮，
    /// 读取之后新增的时间也不会被清掉。
    pub async fn aggregate(&self) -> Result<AggregateReport> {
        let started = Instant::now();
        let pending = self
            .bounded("list pending totals", self.stores.ephemeral.pending())
            .await?;

        let mut report = AggregateReport {
            pending: pending.len(),
            ..Default::default()
        };
        debug!("Found {} pending total time entries", pending.len());

        for (pair, amount_ms) in pending {
            if amount_ms <= 0 {
                report.skipped += 1;
                continue;
            }

            match self.flush_pair(&pair, amount_ms).await {
                Ok(change) => {
                    report.flushed += 1;
                    report.flushed_ms += amount_ms;
                    match change {
                        Some(RelationChange::Created) => report.promoted += 1,
                        Some(RelationChange::Updated) => report.refreshed += 1,
                        None => {}
                    }
                }
                Err(e) => {
                    error!("Failed to flush {}ms for {}: {}", amount_ms, pair, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Aggregation finished in {:?}: flushed={} ({}ms), promoted={}, failed={}",
            started.elapsed(),
            report.flushed,
            report.flushed_ms,
            report.promoted,
            report.failed
        );
        Ok(report)
    }

    async fn flush_pair(&self, pair: &PairKey, amount_ms: i64) -> Result<Option<RelationChange>> {
        let now = self.now_ms();
        let at = DateTime::<Utc>::from_timestamp_millis(now).unwrap_or_else(Utc::now);

        let total = self
            .bounded(
                "upsert proximity total",
                self.stores.totals.add_duration(pair, amount_ms, at),
            )
            .await?;
        debug!(
            "Updated total proximity time for {}: {}ms over {} sessions",
            pair, total.total_duration_ms, total.session_count
        );

        // 扣除失败时下一轮会重复累加
        if let Err(e) = self
            .bounded("consume pending total", self.stores.ephemeral.consume(pair, amount_ms))
            .await
        {
            warn!(
                "Flushed {}ms for {} but could not clear the pending total: {}",
                amount_ms, pair, e
            );
        }

        if total.total_duration_ms < self.config.relation_threshold_ms {
            return Ok(None);
        }

        match self.promote(pair, total.total_duration_ms).await {
            Ok(change) => Ok(change),
            Err(e) => {
                // 下一次该用户对有新的累计时间时会再次尝试
                error!("Failed to promote {}: {}", pair, e);
                Ok(None)
            }
        }
    }
}
