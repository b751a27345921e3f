/// 缓存数据模型
/// 定义 Redis 中保存的临时追踪状态

// 用户对接近状态与附近快照
pub mod proximity;

pub use proximity::{NearbySnapshot, PairState};
