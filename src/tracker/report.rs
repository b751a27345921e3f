use serde::Serialize;

use super::ProximityTracker;
use crate::database::models::{
    ProximitySession, ProximityStats, RelatedUser, UserProximityTotal,
};
use crate::error::Result;
use crate::models::PairKey;

/// 某个有序用户对的接近历史
#[derive(Debug, Clone, Serialize)]
pub struct PairHistory {
    pub sessions: Vec<ProximitySession>,
    pub total: Option<UserProximityTotal>,
}

/// 某个用户的全部接近历史
#[derive(Debug, Clone, Serialize)]
pub struct UserHistory {
    pub sessions: Vec<ProximitySession>,
    pub totals: Vec<UserProximityTotal>,
}

impl ProximityTracker {
    /// 用户对的全部会话（按开始时间倒序）与累计时间
    pub async fn pair_history(&self, user_id: &str, peer_id: &str) -> Result<PairHistory> {
        let pair = PairKey::new(user_id, peer_id);
        let sessions = self
            .bounded("load sessions", self.stores.ledger.sessions(user_id, Some(peer_id)))
            .await?;
        let total = self
            .bounded("load proximity total", self.stores.totals.total(&pair))
            .await?;

        Ok(PairHistory { sessions, total })
    }

    pub async fn user_history(&self, user_id: &str) -> Result<UserHistory> {
        let sessions = self
            .bounded("load sessions", self.stores.ledger.sessions(user_id, None))
            .await?;
        let totals = self
            .bounded("load proximity totals", self.stores.totals.totals_for_user(user_id))
            .await?;

        Ok(UserHistory { sessions, totals })
    }

    pub async fn proximity_stats(&self, user_id: &str) -> Result<ProximityStats> {
        self.bounded("load proximity stats", self.stores.totals.stats(user_id))
            .await
    }

    /// 用户的关系用户列表
    pub async fn related_users(&self, user_id: &str) -> Result<Vec<RelatedUser>> {
        self.bounded("load related users", self.stores.relations.related_users(user_id))
            .await
    }

    pub async fn relation(&self, user_id: &str, related_user_id: &str) -> Result<Option<RelatedUser>> {
        let pair = PairKey::new(user_id, related_user_id);
        self.bounded("load related user", self.stores.relations.find_related(&pair))
            .await
    }

    /// 用户已保存的关系分，未计算过时为 `None`
    pub async fn relation_score(&self, user_id: &str) -> Result<Option<i32>> {
        self.bounded("load relation score", self.stores.scores.relation_score(user_id))
            .await
    }
}
