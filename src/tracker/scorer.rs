use tracing::{info, warn};

use super::ProximityTracker;
use crate::error::Result;

/// 关系分 = round(关系用户总分的平均值 / 4)
///
/// 四舍五入时 0.5 远离零。没有关系用户时为 0。
pub fn relation_score_from_totals(totals: &[i64]) -> i64 {
    if totals.is_empty() {
        return 0;
    }
    let sum: i64 = totals.iter().sum();
    let average = sum as f64 / totals.len() as f64;
    (average / 4.0).round() as i64
}

impl ProximityTracker {
    /// 重算用户的关系分
    ///
    /// 关系用户的总分直接读取已保存的分数（包括他们当前的关系分），不递归重算。
    /// 结果限制在 [0, relation_score_cap]，超出时记录警告。
    pub async fn recompute_relation_score(&self, user_id: &str) -> Result<i32> {
        let related = self
            .bounded("load related users", self.stores.relations.related_users(user_id))
            .await?;

        if related.is_empty() {
            self.bounded(
                "store relation score",
                self.stores.scores.set_relation_score(user_id, 0),
            )
            .await?;
            info!("Updated relation score for user {}: 0 (no related users)", user_id);
            return Ok(0);
        }

        let mut totals = Vec::with_capacity(related.len());
        for relation in &related {
            let components = self
                .bounded(
                    "load score components",
                    self.stores.scores.components(&relation.related_user_id),
                )
                .await?;
            match components {
                Some(components) => totals.push(components.total()),
                None => {
                    warn!(
                        "Related user {} of {} has no score record, counting as 0",
                        relation.related_user_id, user_id
                    );
                    totals.push(0);
                }
            }
        }

        let raw = relation_score_from_totals(&totals);
        let cap = self.config.relation_score_cap.max(0);
        let score = raw.clamp(0, cap as i64) as i32;
        if score as i64 != raw {
            warn!(
                "Relation score {} for user {} out of range [0, {}], clamped to {}",
                raw, user_id, cap, score
            );
        }

        self.bounded(
            "store relation score",
            self.stores.scores.set_relation_score(user_id, score),
        )
        .await?;

        info!(
            "Updated relation score for user {}: {} (related users: {})",
            user_id,
            score,
            totals.len()
        );
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_related_users_scores_zero() {
        assert_eq!(relation_score_from_totals(&[]), 0);
    }

    #[test]
    fn test_average_divided_by_four() {
        assert_eq!(relation_score_from_totals(&[400, 600]), 125);
        assert_eq!(relation_score_from_totals(&[1000]), 250);
    }

    #[test]
    fn test_half_rounds_away_from_zero() {
        // 平均 10 / 4 = 2.5
        assert_eq!(relation_score_from_totals(&[10]), 3);
        // 平均 6 / 4 = 1.5
        assert_eq!(relation_score_from_totals(&[5, 7]), 2);
        // 平均 9 / 4 = 2.25
        assert_eq!(relation_score_from_totals(&[9]), 2);
    }
}
