// 缓存模块
// Redis 中的位置索引、用户对接近状态与未汇总的累计时间

pub mod keys;
pub mod models;
pub mod operations;

// 重新导出常用类型，方便其他模块使用
pub use operations::location::LocationCacheOperations;
pub use operations::proximity::ProximityCacheOperations;
pub use operations::total::TotalTimeCacheOperations;
