use std::sync::Arc;

use geotrack::{TrackerError, build_tracker, config::Config, scheduler::spawn_tracker};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), TrackerError> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置，缺少必需变量时直接退出
    let config = Config::from_env().inspect_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
    })?;

    // 设置数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'geotrack_tracker';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .inspect_err(|e| tracing::error!("Failed to connect to Postgres: {}", e))?;

    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    // 设置 Redis 客户端，启动时先确认可用
    let redis_client = redis::Client::open(config.redis_url.clone())?;
    redis_client
        .get_multiplexed_async_connection()
        .await
        .inspect_err(|e| tracing::error!("Failed to connect to Redis: {}", e))?;

    let tracker = Arc::new(build_tracker(
        pool,
        Arc::new(redis_client),
        config.tracker.clone(),
    ));

    let token = CancellationToken::new();
    let handles = spawn_tracker(tracker, token.clone());
    tracing::info!(
        "Proximity tracker started - sweep every {:?}, aggregate every {:?}",
        config.tracker.sweep_interval(),
        config.tracker.aggregate_interval()
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down proximity tracker");
    token.cancel();
    handles.join().await;

    Ok(())
}
