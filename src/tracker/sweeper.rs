use std::collections::BTreeSet;
use std::time::Instant;

use futures_util::{StreamExt, stream};
use tracing::{debug, error, info, warn};

use super::ProximityTracker;
use super::state::{PairAction, decide};
use crate::cache::models::{NearbySnapshot, PairState};
use crate::error::Result;
use crate::models::{PairKey, ProximityEvent};

/// 单个事件的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOutcome {
    Entered,
    /// enter 重复投递，会话已存在
    AlreadyNear,
    Continued,
    /// 状态缺失或过期，已重新建立会话或写回状态
    Healed,
    Exited { duration_ms: i64 },
    /// exit 时没有对应的会话
    Ignored,
}

/// 单个用户一轮扫描的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSweep {
    pub entered: usize,
    pub continued: usize,
    pub healed: usize,
    pub exited: usize,
    pub exited_ms: i64,
    pub anomalies: usize,
    pub failed_pairs: usize,
}

impl UserSweep {
    fn record(&mut self, outcome: PairOutcome) {
        match outcome {
            PairOutcome::Entered => self.entered += 1,
            PairOutcome::AlreadyNear | PairOutcome::Continued => self.continued += 1,
            PairOutcome::Healed => {
                self.healed += 1;
                self.anomalies += 1;
            }
            PairOutcome::Exited { duration_ms } => {
                self.exited += 1;
                self.exited_ms += duration_ms;
            }
            PairOutcome::Ignored => self.anomalies += 1,
        }
    }
}

/// 一轮扫描的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub users: usize,
    pub failed_users: usize,
    pub entered: usize,
    pub continued: usize,
    pub healed: usize,
    pub exited: usize,
    pub exited_ms: i64,
    pub anomalies: usize,
    pub failed_pairs: usize,
}

impl SweepReport {
    fn merge(&mut self, user: &UserSweep) {
        self.entered += user.entered;
        self.continued += user.continued;
        self.healed += user.healed;
        self.exited += user.exited;
        self.exited_ms += user.exited_ms;
        self.anomalies += user.anomalies;
        self.failed_pairs += user.failed_pairs;
    }
}

impl ProximityTracker {
    /// 扫描所有有位置的用户
    ///
    /// 单个用户失败只记录日志，不影响其他用户；只有获取用户列表失败时整轮返回错误。
    pub async fn sweep(&self) -> Result<SweepReport> {
        let started = Instant::now();
        let users = self
            .bounded("list known users", self.stores.locations.list_known_users())
            .await?;

        let results: Vec<(String, Result<UserSweep>)> = stream::iter(users)
            .map(|user_id| async move {
                let result = self.check_user(&user_id).await;
                (user_id, result)
            })
            .buffer_unordered(self.config.sweep_concurrency.max(1))
            .collect()
            .await;

        let mut report = SweepReport::default();
        for (user_id, result) in results {
            report.users += 1;
            match result {
                Ok(user) => report.merge(&user),
                Err(e) => {
                    error!("Error checking proximity for user {}: {}", user_id, e);
                    report.failed_users += 1;
                }
            }
        }

        info!(
            "Proximity sweep finished in {:?}: users={}, entered={}, exited={}, anomalies={}, failed_users={}",
            started.elapsed(),
            report.users,
            report.entered,
            report.exited,
            report.anomalies,
            report.failed_users
        );
        Ok(report)
    }

    /// 对比用户本轮与上一轮的附近集合，并处理差异
    pub async fn check_user(&self, user_id: &str) -> Result<UserSweep> {
        let nearby = self
            .bounded(
                "nearby users",
                self.stores
                    .locations
                    .nearby(user_id, self.config.proximity_radius_m),
            )
            .await?;
        let current: BTreeSet<String> = nearby
            .into_iter()
            .map(|user| user.user_id)
            .filter(|id| id != user_id)
            .collect();

        let previous = self
            .bounded("load nearby snapshot", self.stores.state.load_nearby(user_id))
            .await?
            .map(|snapshot| snapshot.peers)
            .unwrap_or_default();

        let mut outcome = UserSweep::default();
        // exit 失败的用户保留在快照中，下一轮会再次检测到离开
        let mut retained = BTreeSet::new();

        for peer_id in &current {
            let event = if previous.contains(peer_id) {
                ProximityEvent::Continue
            } else {
                ProximityEvent::Enter
            };
            match self.handle_event(user_id, peer_id, event).await {
                Ok(result) => outcome.record(result),
                Err(e) => {
                    warn!("Failed to handle {} for {} -> {}: {}", event, user_id, peer_id, e);
                    outcome.failed_pairs += 1;
                }
            }
        }

        for peer_id in previous.difference(&current) {
            match self.handle_event(user_id, peer_id, ProximityEvent::Exit).await {
                Ok(result) => outcome.record(result),
                Err(e) => {
                    warn!("Failed to handle exit for {} -> {}: {}", user_id, peer_id, e);
                    outcome.failed_pairs += 1;
                    retained.insert(peer_id.clone());
                }
            }
        }

        let mut peers = current;
        peers.extend(retained);
        let snapshot = NearbySnapshot::new(peers, self.now_ms());
        self.bounded(
            "store nearby snapshot",
            self.stores
                .state
                .replace_nearby(user_id, &snapshot, self.config.nearby_ttl()),
        )
        .await?;

        Ok(outcome)
    }

    /// 处理单个用户对的事件，同一用户对的事件串行执行
    pub async fn handle_event(
        &self,
        user_id: &str,
        peer_id: &str,
        event: ProximityEvent,
    ) -> Result<PairOutcome> {
        let pair = PairKey::new(user_id, peer_id);
        let _guard = self.locks.lock(&pair).await;

        let state = self
            .bounded("load pair state", self.stores.state.get_pair(&pair))
            .await?;
        let session_open = match (&state, event) {
            (Some(state), ProximityEvent::Enter | ProximityEvent::Continue) => {
                self.bounded("check session", self.stores.ledger.is_open(state.session_id))
                    .await?
            }
            _ => false,
        };

        match decide(event, state, session_open) {
            PairAction::Open => {
                self.open_pair(&pair).await?;
                info!("User {} entered proximity of {}", user_id, peer_id);
                Ok(PairOutcome::Entered)
            }
            PairAction::Keep(state) => {
                let refreshed = self
                    .bounded(
                        "refresh pair state",
                        self.stores.state.touch_pair(&pair, self.config.nearby_ttl()),
                    )
                    .await?;
                if !refreshed {
                    // 读取之后状态已过期，会话仍然打开，写回原状态
                    warn!(
                        "Pair state for {} expired while session {} is open, restoring",
                        pair, state.session_id
                    );
                    self.bounded(
                        "restore pair state",
                        self.stores
                            .state
                            .put_pair(&pair, &state, self.config.nearby_ttl()),
                    )
                    .await?;
                    return Ok(PairOutcome::Healed);
                }
                if event == ProximityEvent::Enter {
                    debug!("Duplicate enter for {}, session already open", pair);
                    Ok(PairOutcome::AlreadyNear)
                } else {
                    debug!("User {} still in proximity of {}", user_id, peer_id);
                    Ok(PairOutcome::Continued)
                }
            }
            PairAction::Reopen { stale } => {
                match stale {
                    Some(stale) => warn!(
                        "Pair {} references session {} which is no longer open, re-entering",
                        pair, stale.session_id
                    ),
                    None => warn!("No active session found for {}, re-entering", pair),
                }
                self.open_pair(&pair).await?;
                Ok(PairOutcome::Healed)
            }
            PairAction::Close(state) => self.close_pair(&pair, state).await,
            PairAction::Ignore => {
                warn!("Exit for {} without an open session, skipping", pair);
                Ok(PairOutcome::Ignored)
            }
        }
    }

    async fn open_pair(&self, pair: &PairKey) -> Result<PairState> {
        let now = self.now_ms();
        let session_id = self
            .bounded(
                "open session",
                self.stores.ledger.open(&pair.user_id, &pair.peer_id, now),
            )
            .await?;

        let state = PairState {
            session_id,
            start_time: now,
        };
        if let Err(e) = self
            .bounded(
                "store pair state",
                self.stores
                    .state
                    .put_pair(pair, &state, self.config.nearby_ttl()),
            )
            .await
        {
            // 状态写入失败时关闭刚打开的会话
            if let Err(close_err) = self
                .bounded("close orphaned session", self.stores.ledger.close(session_id, now))
                .await
            {
                error!("Failed to close orphaned session {}: {}", session_id, close_err);
            }
            return Err(e);
        }

        Ok(state)
    }

    async fn close_pair(&self, pair: &PairKey, state: PairState) -> Result<PairOutcome> {
        let now = self.now_ms();
        let end_time = if now < state.start_time {
            warn!(
                "Exit time {} before session start {} for {}, using zero duration",
                now, state.start_time, pair
            );
            state.start_time
        } else {
            now
        };

        let closed = self
            .bounded(
                "close session",
                self.stores.ledger.close(state.session_id, end_time),
            )
            .await?;

        let session = match closed {
            Some(session) => session,
            None => {
                // 状态仍在而会话已关闭：上一次 exit 在关闭之后失败，从账本记录继续
                let recorded = self
                    .bounded("load session", self.stores.ledger.session(state.session_id))
                    .await?;
                match recorded {
                    Some(session) if !session.is_open() => {
                        warn!(
                            "Session {} for {} was already closed, resuming exit",
                            state.session_id, pair
                        );
                        session
                    }
                    _ => {
                        warn!(
                            "Session {} for {} is missing, skipping exit",
                            state.session_id, pair
                        );
                        self.bounded("clear pair state", self.stores.state.delete_pair(pair))
                            .await?;
                        return Ok(PairOutcome::Ignored);
                    }
                }
            }
        };

        let duration_ms = session
            .duration_ms
            .unwrap_or(end_time - state.start_time)
            .max(0);
        if duration_ms > 0 {
            match self
                .bounded(
                    "accumulate time",
                    self.stores.ephemeral.add(pair, session.id, duration_ms),
                )
                .await
            {
                Ok(true) => {}
                Ok(false) => debug!("Session {} already accumulated for {}", session.id, pair),
                Err(e) => {
                    error!(
                        "Closed session {} but failed to accumulate {}ms for {}: {}",
                        session.id, duration_ms, pair, e
                    );
                    return Err(e);
                }
            }
        }

        self.bounded("clear pair state", self.stores.state.delete_pair(pair))
            .await?;

        info!(
            "User {} exited proximity of {}, duration: {}s",
            pair.user_id,
            pair.peer_id,
            duration_ms / 1000
        );
        Ok(PairOutcome::Exited { duration_ms })
    }
}
