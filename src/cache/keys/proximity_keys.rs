use uuid::Uuid;

use crate::models::PairKey;

/// 用户位置 GEO 索引键，由位置更新接口写入
pub const USER_GEO_KEY: &str = "user_locations";

/// 附近快照键前缀
const NEARBY_SNAPSHOT_PREFIX: &str = "current_nearby:";

/// 用户对接近状态键前缀
const PAIR_STATE_PREFIX: &str = "proximity:";

/// 未汇总累计时间键前缀
const TOTAL_TIME_PREFIX: &str = "total_time_near:";

/// 已计入累计时间的会话标记键前缀
const ACCRUED_SESSION_PREFIX: &str = "accrued_session:";

/// 扫描全部未汇总累计时间的模式
pub const TOTAL_TIME_PATTERN: &str = "total_time_near:*";

/// 生成附近快照键
pub fn nearby_snapshot_key(user_id: &str) -> String {
    format!("{}{}", NEARBY_SNAPSHOT_PREFIX, user_id)
}

/// 生成用户对接近状态键
pub fn pair_state_key(pair: &PairKey) -> String {
    format!("{}{}:{}", PAIR_STATE_PREFIX, pair.user_id, pair.peer_id)
}

/// 生成未汇总累计时间键
pub fn total_time_key(pair: &PairKey) -> String {
    format!("{}{}:{}", TOTAL_TIME_PREFIX, pair.user_id, pair.peer_id)
}

/// 生成会话已计入标记键
pub fn accrued_session_key(session_id: &Uuid) -> String {
    format!("{}{}", ACCRUED_SESSION_PREFIX, session_id)
}

/// 从累计时间键解析用户对
///
/// 用户 ID 中不能包含 `:`，否则无法区分两个 ID 的边界。
pub fn parse_total_time_key(key: &str) -> Option<PairKey> {
    let rest = key.strip_prefix(TOTAL_TIME_PREFIX)?;
    let (user_id, peer_id) = rest.split_once(':')?;
    if user_id.is_empty() || peer_id.is_empty() || peer_id.contains(':') {
        return None;
    }
    Some(PairKey::new(user_id, peer_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_time_key_round_trip() {
        let pair = PairKey::new("u1", "u2");
        let key = total_time_key(&pair);
        assert_eq!(key, "total_time_near:u1:u2");
        assert_eq!(parse_total_time_key(&key), Some(pair));
    }

    #[test]
    fn test_parse_rejects_malformed_keys() {
        assert_eq!(parse_total_time_key("total_time_near:u1"), None);
        assert_eq!(parse_total_time_key("total_time_near::u2"), None);
        assert_eq!(parse_total_time_key("total_time_near:a:b:c"), None);
        assert_eq!(parse_total_time_key("proximity:u1:u2"), None);
    }

    #[test]
    fn test_pair_keys_are_directional() {
        let pair = PairKey::new("u1", "u2");
        assert_ne!(pair_state_key(&pair), pair_state_key(&pair.reversed()));
    }
}
