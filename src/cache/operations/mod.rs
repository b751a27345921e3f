/// 缓存操作
/// 提供 Redis 读写逻辑

// 用户位置 GEO 索引
pub mod location;

// 用户对接近状态与附近快照
pub mod proximity;

// 未汇总累计时间
pub mod total;
