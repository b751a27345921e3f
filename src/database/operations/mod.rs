// 数据库操作实现

pub mod relation;
pub mod score;
pub mod session;
pub mod total;
