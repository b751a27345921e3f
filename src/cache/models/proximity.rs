use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 用户对“正在附近”状态，指向一个未关闭的接近会话
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PairState {
    pub session_id: Uuid,
    pub start_time: i64, // Unix timestamp (ms)
}

/// 上一轮扫描得到的附近用户集合
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct NearbySnapshot {
    pub peers: BTreeSet<String>,
    pub taken_at: i64, // Unix timestamp (ms)
}

impl NearbySnapshot {
    pub fn new(peers: BTreeSet<String>, taken_at: i64) -> Self {
        Self { peers, taken_at }
    }
}
