// 数据库模块
// 包含数据库实体定义和存储库操作

pub mod models; // 数据库实体定义
pub mod operations; // 数据库操作实现

// 重新导出常用类型和函数，方便其他模块使用
pub use operations::relation::RelationOperation;
pub use operations::score::ScoreOperation;
pub use operations::session::SessionOperation;
pub use operations::total::TotalOperation;
