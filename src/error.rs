use thiserror::Error;

/// 追踪器错误
///
/// 除 `Config` 与 `Migration` 只在启动阶段出现外，其余错误都限定在单个用户或单个用户对的处理范围内，
/// 由调用方记录日志后在下一轮重试。
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("invalid position ({longitude}, {latitude})")]
    InvalidPosition { longitude: f64, latitude: f64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// 内存实现中用于模拟存储故障
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
