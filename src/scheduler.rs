//! 周期任务
//!
//! 扫描与汇总各自按固定周期运行，互不等待。取消后不再调度新的周期，
//! 正在执行的周期会跑完（受单周期超时限制）。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::tracker::ProximityTracker;

/// 按 `period` 重复执行 `tick`，单次超过 `tick_timeout` 时放弃本次执行
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    tick_timeout: Duration,
    token: CancellationToken,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        // 上一次执行过长时跳过错过的周期，不连续补跑
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("{} started, running every {:?}", name, period);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    if tokio::time::timeout(tick_timeout, tick()).await.is_err() {
                        warn!("{} tick exceeded {:?}, abandoned", name, tick_timeout);
                    }
                }
            }
        }
        info!("{} stopped", name);
    })
}

/// 正在运行的扫描与汇总任务
pub struct TrackerHandles {
    pub sweeper: JoinHandle<()>,
    pub aggregator: JoinHandle<()>,
}

impl TrackerHandles {
    /// 等待两个任务退出
    pub async fn join(self) {
        for (name, handle) in [("sweeper", self.sweeper), ("aggregator", self.aggregator)] {
            if let Err(e) = handle.await {
                error!("{} task failed: {}", name, e);
            }
        }
    }
}

/// 启动扫描与汇总任务，`token` 取消后两者都会停止
pub fn spawn_tracker(tracker: Arc<ProximityTracker>, token: CancellationToken) -> TrackerHandles {
    let config = tracker.config().clone();

    let sweep_tracker = tracker.clone();
    let sweeper = spawn_periodic(
        "Proximity sweeper",
        config.sweep_interval(),
        config.tick_timeout(),
        token.clone(),
        move || {
            let tracker = sweep_tracker.clone();
            async move {
                if let Err(e) = tracker.sweep().await {
                    error!("Error in proximity check: {}", e);
                }
            }
        },
    );

    let aggregator = spawn_periodic(
        "Proximity aggregator",
        config.aggregate_interval(),
        config.tick_timeout(),
        token,
        move || {
            let tracker = tracker.clone();
            async move {
                if let Err(e) = tracker.aggregate().await {
                    error!("Error in batch store: {}", e);
                }
            }
        },
    );

    TrackerHandles {
        sweeper,
        aggregator,
    }
}
