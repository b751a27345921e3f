use std::fmt;

use serde::{Deserialize, Serialize};

/// 有序用户对：user_id -> peer_id
///
/// (a, b) 与 (b, a) 是两个互相独立的条目。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub user_id: String,
    pub peer_id: String,
}

impl PairKey {
    pub fn new(user_id: impl Into<String>, peer_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            peer_id: peer_id.into(),
        }
    }

    /// 反向用户对
    pub fn reversed(&self) -> Self {
        Self::new(self.peer_id.clone(), self.user_id.clone())
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.user_id, self.peer_id)
    }
}

/// 位置存储返回的附近用户
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyUser {
    pub user_id: String,
    pub distance_m: f64,
    pub longitude: f64,
    pub latitude: f64,
}

/// 扫描两次快照差异得到的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityEvent {
    /// 本轮出现、上一轮不在
    Enter,
    /// 两轮都在
    Continue,
    /// 上一轮在、本轮消失
    Exit,
}

impl fmt::Display for ProximityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProximityEvent::Enter => "enter",
            ProximityEvent::Continue => "continue",
            ProximityEvent::Exit => "exit",
        };
        f.write_str(name)
    }
}
