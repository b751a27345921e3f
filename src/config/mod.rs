use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::TrackerError;

/// 6 小时，单位毫秒
pub const DEFAULT_RELATION_THRESHOLD_MS: i64 = 21_600_000;

/// 追踪器运行参数
#[derive(Debug, Clone, serde::Deserialize)]
pub struct TrackerConfig {
    pub sweep_interval_secs: u64,
    pub aggregate_interval_secs: u64,
    pub proximity_radius_m: f64,
    pub nearby_ttl_secs: u64,
    pub relation_threshold_ms: i64,
    pub operation_timeout_ms: u64,
    pub tick_timeout_secs: u64,
    pub sweep_concurrency: usize,
    pub relation_score_cap: i32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 10,
            aggregate_interval_secs: 60,
            proximity_radius_m: 100.0,
            nearby_ttl_secs: 300,
            relation_threshold_ms: DEFAULT_RELATION_THRESHOLD_MS,
            operation_timeout_ms: 5000,
            tick_timeout_secs: 60,
            sweep_concurrency: 16,
            relation_score_cap: 250,
        }
    }
}

impl TrackerConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn aggregate_interval(&self) -> Duration {
        Duration::from_secs(self.aggregate_interval_secs)
    }

    pub fn nearby_ttl(&self) -> Duration {
        Duration::from_secs(self.nearby_ttl_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn tick_timeout(&self) -> Duration {
        Duration::from_secs(self.tick_timeout_secs)
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub tracker: TrackerConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, TrackerError> {
        dotenv::dotenv().ok();

        let defaults = TrackerConfig::default();
        let tracker = TrackerConfig {
            sweep_interval_secs: env_or("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs),
            aggregate_interval_secs: env_or(
                "AGGREGATE_INTERVAL_SECS",
                defaults.aggregate_interval_secs,
            ),
            proximity_radius_m: env_or("PROXIMITY_RADIUS_METERS", defaults.proximity_radius_m),
            nearby_ttl_secs: env_or("NEARBY_TTL_SECS", defaults.nearby_ttl_secs),
            relation_threshold_ms: env_or("RELATION_THRESHOLD_MS", defaults.relation_threshold_ms),
            operation_timeout_ms: env_or("OPERATION_TIMEOUT_MS", defaults.operation_timeout_ms),
            tick_timeout_secs: env_or("TICK_TIMEOUT_SECS", defaults.tick_timeout_secs),
            sweep_concurrency: env_or("SWEEP_CONCURRENCY", defaults.sweep_concurrency).max(1),
            relation_score_cap: env_or("RELATION_SCORE_CAP", defaults.relation_score_cap),
        };

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            redis_url: required("REDIS_URL")?,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            run_migrations: env_or("RUN_MIGRATIONS", true),
            tracker,
        })
    }
}

// 必需变量：缺失时返回带变量名的配置错误
fn required(name: &str) -> Result<String, TrackerError> {
    env::var(name).map_err(|e| TrackerError::Config(format!("{}: {}", name, e)))
}

// 可选变量：缺失或解析失败时使用默认值
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    parse_or(env::var(name).ok().as_deref(), default)
}

fn parse_or<T: FromStr>(raw: Option<&str>, default: T) -> T {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_config_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.sweep_interval(), Duration::from_secs(10));
        assert_eq!(config.aggregate_interval(), Duration::from_secs(60));
        assert_eq!(config.nearby_ttl(), Duration::from_secs(300));
        assert_eq!(config.relation_threshold_ms, 21_600_000);
        assert_eq!(config.relation_score_cap, 250);
    }

    #[test]
    fn test_missing_required_variable_is_named() {
        let err = required("GEOTRACK_NOT_A_REAL_VARIABLE").unwrap_err();
        assert!(matches!(err, TrackerError::Config(_)));
        assert!(err.to_string().contains("GEOTRACK_NOT_A_REAL_VARIABLE"));
    }

    #[test]
    fn test_parse_or_falls_back() {
        assert_eq!(parse_or::<u64>(Some("30"), 10), 30);
        assert_eq!(parse_or::<u64>(Some(" 30 "), 10), 30);
        assert_eq!(parse_or::<u64>(Some("abc"), 10), 10);
        assert_eq!(parse_or::<u64>(None, 10), 10);
        assert!(!parse_or::<bool>(Some("false"), true));
    }
}
