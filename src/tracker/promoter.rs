use tracing::{info, warn};

use super::ProximityTracker;
use crate::database::models::RelationChange;
use crate::error::Result;
use crate::models::PairKey;
use crate::utils::ms_to_hours;

impl ProximityTracker {
    /// 累计时间达到阈值后建立或刷新关系用户，并重算双方的关系分
    ///
    /// 关系按有序用户对记录，不会自动建立反向关系。低于阈值时返回 `None`。
    pub async fn promote(&self, pair: &PairKey, total_ms: i64) -> Result<Option<RelationChange>> {
        if total_ms < self.config.relation_threshold_ms {
            return Ok(None);
        }

        let change = self
            .bounded(
                "upsert related user",
                self.stores.relations.upsert_related(pair, total_ms),
            )
            .await?;

        match change {
            RelationChange::Created => info!(
                "Created related user {} ({}h)",
                pair,
                ms_to_hours(total_ms)
            ),
            RelationChange::Updated => info!(
                "Updated related user {} ({}h)",
                pair,
                ms_to_hours(total_ms)
            ),
        }

        for user_id in [&pair.user_id, &pair.peer_id] {
            if let Err(e) = self.recompute_relation_score(user_id).await {
                warn!("Error updating relation score for user {}: {}", user_id, e);
            }
        }

        Ok(Some(change))
    }
}
