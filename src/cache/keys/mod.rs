/// 缓存键模块
/// 提供各种缓存键生成函数

// 用户位置与接近追踪缓存键
pub mod proximity_keys;

pub use proximity_keys::{
    USER_GEO_KEY, TOTAL_TIME_PATTERN, accrued_session_key, nearby_snapshot_key, pair_state_key, parse_total_time_key,
    total_time_key,
};
