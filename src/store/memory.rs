//! 内存存储实现
//!
//! 语义与 Redis / Postgres 实现一致，用于测试和本地调试。
//! 所有锁都是同步锁，持有期间不会 await。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use crate::cache::models::{NearbySnapshot, PairState};
use crate::database::models::{
    ProximitySession, ProximityStats, RelatedUser, RelationChange, ScoreComponents,
    UserProximityTotal,
};
use crate::error::{Result, TrackerError};
use crate::models::{NearbyUser, PairKey};
use crate::store::{
    Clock, EphemeralTotals, LocationStore, ProximityStateStore, ProximityTotals, RelationStore,
    ScoreStore, SessionLedger, TrackerStores,
};
use crate::utils::calculate_distance;

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn unavailable(flag: &AtomicBool, name: &str) -> Result<()> {
    if flag.load(Ordering::SeqCst) {
        return Err(TrackerError::Unavailable(name.to_string()));
    }
    Ok(())
}

/// 手动推进的时钟
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct MemoryLocationStore {
    positions: Mutex<BTreeMap<String, (f64, f64)>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryLocationStore {
    pub fn remove(&self, user_id: &str) {
        guard(&self.positions).remove(user_id);
    }

    /// 之后对该用户的 `nearby` 查询都返回错误
    pub fn fail_user(&self, user_id: &str) {
        guard(&self.failing).insert(user_id.to_string());
    }

    pub fn recover_user(&self, user_id: &str) {
        guard(&self.failing).remove(user_id);
    }
}

#[async_trait]
impl LocationStore for MemoryLocationStore {
    async fn set_position(&self, user_id: &str, longitude: f64, latitude: f64) -> Result<()> {
        guard(&self.positions).insert(user_id.to_string(), (longitude, latitude));
        Ok(())
    }

    async fn list_known_users(&self) -> Result<Vec<String>> {
        Ok(guard(&self.positions).keys().cloned().collect())
    }

    async fn nearby(&self, user_id: &str, radius_m: f64) -> Result<Vec<NearbyUser>> {
        if guard(&self.failing).contains(user_id) {
            return Err(TrackerError::Unavailable(format!("location of {}", user_id)));
        }

        let positions = guard(&self.positions);
        let Some(&(lon, lat)) = positions.get(user_id) else {
            return Ok(Vec::new());
        };

        let mut nearby: Vec<NearbyUser> = positions
            .iter()
            .map(|(id, &(other_lon, other_lat))| NearbyUser {
                user_id: id.clone(),
                distance_m: calculate_distance(lat, lon, other_lat, other_lon),
                longitude: other_lon,
                latitude: other_lat,
            })
            .filter(|user| user.distance_m <= radius_m)
            .collect();
        nearby.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
        Ok(nearby)
    }
}

#[derive(Debug)]
struct Expiring<T> {
    value: T,
    expires_at: Instant,
}

impl<T> Expiring<T> {
    fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    pairs: Mutex<HashMap<PairKey, Expiring<PairState>>>,
    snapshots: Mutex<HashMap<String, Expiring<NearbySnapshot>>>,
}

impl MemoryStateStore {
    pub fn live_pairs(&self) -> usize {
        guard(&self.pairs).values().filter(|e| e.is_live()).count()
    }
}

#[async_trait]
impl ProximityStateStore for MemoryStateStore {
    async fn get_pair(&self, pair: &PairKey) -> Result<Option<PairState>> {
        let mut pairs = guard(&self.pairs);
        match pairs.get(pair) {
            Some(entry) if entry.is_live() => Ok(Some(entry.value.clone())),
            Some(_) => {
                pairs.remove(pair);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put_pair(&self, pair: &PairKey, state: &PairState, ttl: Duration) -> Result<()> {
        guard(&self.pairs).insert(pair.clone(), Expiring::new(state.clone(), ttl));
        Ok(())
    }

    async fn touch_pair(&self, pair: &PairKey, ttl: Duration) -> Result<bool> {
        let mut pairs = guard(&self.pairs);
        match pairs.get_mut(pair) {
            Some(entry) if entry.is_live() => {
                entry.expires_at = Instant::now() + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_pair(&self, pair: &PairKey) -> Result<()> {
        guard(&self.pairs).remove(pair);
        Ok(())
    }

    async fn load_nearby(&self, user_id: &str) -> Result<Option<NearbySnapshot>> {
        let snapshots = guard(&self.snapshots);
        Ok(snapshots
            .get(user_id)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.value.clone()))
    }

    async fn replace_nearby(
        &self,
        user_id: &str,
        snapshot: &NearbySnapshot,
        ttl: Duration,
    ) -> Result<()> {
        let mut snapshots = guard(&self.snapshots);
        if snapshot.peers.is_empty() {
            snapshots.remove(user_id);
        } else {
            snapshots.insert(user_id.to_string(), Expiring::new(snapshot.clone(), ttl));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryEphemeralTotals {
    totals: Mutex<HashMap<PairKey, i64>>,
    accrued: Mutex<HashSet<Uuid>>,
}

impl MemoryEphemeralTotals {
    pub fn value(&self, pair: &PairKey) -> i64 {
        guard(&self.totals).get(pair).copied().unwrap_or(0)
    }

    /// 直接写入一个值，用于构造边界情况
    pub fn insert_raw(&self, pair: PairKey, value: i64) {
        guard(&self.totals).insert(pair, value);
    }
}

#[async_trait]
impl EphemeralTotals for MemoryEphemeralTotals {
    async fn add(&self, pair: &PairKey, session_id: Uuid, duration_ms: i64) -> Result<bool> {
        let mut accrued = guard(&self.accrued);
        if !accrued.insert(session_id) {
            return Ok(false);
        }
        *guard(&self.totals).entry(pair.clone()).or_insert(0) += duration_ms;
        Ok(true)
    }

    async fn pending(&self) -> Result<Vec<(PairKey, i64)>> {
        let mut pending: Vec<(PairKey, i64)> = guard(&self.totals)
            .iter()
            .map(|(pair, value)| (pair.clone(), *value))
            .collect();
        pending.sort();
        Ok(pending)
    }

    async fn consume(&self, pair: &PairKey, amount_ms: i64) -> Result<i64> {
        let mut totals = guard(&self.totals);
        let remaining = match totals.get_mut(pair) {
            Some(value) => {
                *value -= amount_ms;
                *value
            }
            None => 0,
        };
        if remaining <= 0 {
            totals.remove(pair);
        }
        Ok(remaining.max(0))
    }
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    sessions: Mutex<HashMap<Uuid, ProximitySession>>,
}

impl MemoryLedger {
    pub fn all(&self) -> Vec<ProximitySession> {
        let mut sessions: Vec<ProximitySession> = guard(&self.sessions).values().cloned().collect();
        sessions.sort_by_key(|s| s.start_time);
        sessions
    }

    pub fn open_count(&self, pair: &PairKey) -> usize {
        guard(&self.sessions)
            .values()
            .filter(|s| s.user_id == pair.user_id && s.nearby_user_id == pair.peer_id)
            .filter(|s| s.is_open())
            .count()
    }
}

#[async_trait]
impl SessionLedger for MemoryLedger {
    async fn open(&self, user_id: &str, peer_id: &str, start_time: i64) -> Result<Uuid> {
        let id = Uuid::new_v4();
        guard(&self.sessions).insert(
            id,
            ProximitySession {
                id,
                user_id: user_id.to_string(),
                nearby_user_id: peer_id.to_string(),
                start_time,
                end_time: None,
                duration_ms: None,
            },
        );
        Ok(id)
    }

    async fn close(&self, session_id: Uuid, end_time: i64) -> Result<Option<ProximitySession>> {
        let mut sessions = guard(&self.sessions);
        match sessions.get_mut(&session_id) {
            Some(session) if session.is_open() => {
                session.end_time = Some(end_time);
                session.duration_ms = Some(end_time - session.start_time);
                Ok(Some(session.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn is_open(&self, session_id: Uuid) -> Result<bool> {
        Ok(guard(&self.sessions)
            .get(&session_id)
            .is_some_and(|s| s.is_open()))
    }

    async fn session(&self, session_id: Uuid) -> Result<Option<ProximitySession>> {
        Ok(guard(&self.sessions).get(&session_id).cloned())
    }

    async fn sessions(
        &self,
        user_id: &str,
        peer_id: Option<&str>,
    ) -> Result<Vec<ProximitySession>> {
        let mut sessions: Vec<ProximitySession> = guard(&self.sessions)
            .values()
            .filter(|s| s.user_id == user_id)
            .filter(|s| peer_id.is_none_or(|peer| s.nearby_user_id == peer))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(sessions)
    }
}

#[derive(Debug, Default)]
pub struct MemoryTotals {
    totals: Mutex<BTreeMap<PairKey, UserProximityTotal>>,
    unavailable: AtomicBool,
}

impl MemoryTotals {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 直接写入累计值，用于构造阈值附近的场景
    pub fn insert_raw(&self, total: UserProximityTotal) {
        let pair = PairKey::new(total.user_id.clone(), total.nearby_user_id.clone());
        guard(&self.totals).insert(pair, total);
    }
}

#[async_trait]
impl ProximityTotals for MemoryTotals {
    async fn add_duration(
        &self,
        pair: &PairKey,
        duration_ms: i64,
        at: DateTime<Utc>,
    ) -> Result<UserProximityTotal> {
        unavailable(&self.unavailable, "proximity totals")?;

        let mut totals = guard(&self.totals);
        let total = totals
            .entry(pair.clone())
            .and_modify(|t| {
                t.total_duration_ms += duration_ms;
                t.session_count += 1;
                t.last_session_at = at;
            })
            .or_insert_with(|| UserProximityTotal {
                user_id: pair.user_id.clone(),
                nearby_user_id: pair.peer_id.clone(),
                total_duration_ms: duration_ms,
                session_count: 1,
                last_session_at: at,
            });
        Ok(total.clone())
    }

    async fn total(&self, pair: &PairKey) -> Result<Option<UserProximityTotal>> {
        unavailable(&self.unavailable, "proximity totals")?;
        Ok(guard(&self.totals).get(pair).cloned())
    }

    async fn totals_for_user(&self, user_id: &str) -> Result<Vec<UserProximityTotal>> {
        unavailable(&self.unavailable, "proximity totals")?;
        Ok(guard(&self.totals)
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn stats(&self, user_id: &str) -> Result<ProximityStats> {
        let totals = self.totals_for_user(user_id).await?;
        Ok(ProximityStats {
            total_time_ms: totals.iter().map(|t| t.total_duration_ms).sum(),
            total_sessions: totals.iter().map(|t| t.session_count as i64).sum(),
            unique_contacts: totals.len() as i64,
            last_session_at: totals.iter().map(|t| t.last_session_at).max(),
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryRelations {
    related: Mutex<BTreeMap<PairKey, RelatedUser>>,
}

impl MemoryRelations {
    pub fn insert_raw(&self, user_id: &str, related_user_id: &str, spent_time_ms: i64) {
        guard(&self.related).insert(
            PairKey::new(user_id, related_user_id),
            RelatedUser {
                user_id: user_id.to_string(),
                related_user_id: related_user_id.to_string(),
                spent_time_ms,
            },
        );
    }

    pub fn count(&self) -> usize {
        guard(&self.related).len()
    }
}

#[async_trait]
impl RelationStore for MemoryRelations {
    async fn find_related(&self, pair: &PairKey) -> Result<Option<RelatedUser>> {
        Ok(guard(&self.related).get(pair).cloned())
    }

    async fn upsert_related(&self, pair: &PairKey, spent_time_ms: i64) -> Result<RelationChange> {
        let mut related = guard(&self.related);
        match related.get_mut(pair) {
            Some(existing) => {
                existing.spent_time_ms = spent_time_ms;
                Ok(RelationChange::Updated)
            }
            None => {
                related.insert(
                    pair.clone(),
                    RelatedUser {
                        user_id: pair.user_id.clone(),
                        related_user_id: pair.peer_id.clone(),
                        spent_time_ms,
                    },
                );
                Ok(RelationChange::Created)
            }
        }
    }

    async fn related_users(&self, user_id: &str) -> Result<Vec<RelatedUser>> {
        Ok(guard(&self.related)
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryScores {
    components: Mutex<HashMap<String, ScoreComponents>>,
    relation: Mutex<HashMap<String, i32>>,
}

impl MemoryScores {
    /// 登记一个用户及其由应用其他部分维护的分项
    pub fn set_components(&self, user_id: &str, criminal: i64, other: i64, rating: i64) {
        guard(&self.components).insert(
            user_id.to_string(),
            ScoreComponents {
                user_id: user_id.to_string(),
                relation_score: 0,
                criminal_score: criminal,
                other_score: other,
                rating_score: rating,
            },
        );
    }
}

#[async_trait]
impl ScoreStore for MemoryScores {
    async fn components(&self, user_id: &str) -> Result<Option<ScoreComponents>> {
        let relation = guard(&self.relation).get(user_id).copied().unwrap_or(0);
        Ok(guard(&self.components).get(user_id).map(|c| ScoreComponents {
            relation_score: relation as i64,
            ..c.clone()
        }))
    }

    async fn relation_score(&self, user_id: &str) -> Result<Option<i32>> {
        Ok(guard(&self.relation).get(user_id).copied())
    }

    async fn set_relation_score(&self, user_id: &str, score: i32) -> Result<()> {
        guard(&self.relation).insert(user_id.to_string(), score);
        Ok(())
    }
}

/// 全部内存存储，保留具体类型以便测试直接检查内部状态
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    pub locations: Arc<MemoryLocationStore>,
    pub state: Arc<MemoryStateStore>,
    pub ephemeral: Arc<MemoryEphemeralTotals>,
    pub ledger: Arc<MemoryLedger>,
    pub totals: Arc<MemoryTotals>,
    pub relations: Arc<MemoryRelations>,
    pub scores: Arc<MemoryScores>,
    pub clock: Arc<ManualClock>,
}

impl MemoryBackend {
    pub fn new(start_ms: i64) -> Self {
        Self {
            locations: Arc::default(),
            state: Arc::default(),
            ephemeral: Arc::default(),
            ledger: Arc::default(),
            totals: Arc::default(),
            relations: Arc::default(),
            scores: Arc::default(),
            clock: Arc::new(ManualClock::new(start_ms)),
        }
    }

    pub fn stores(&self) -> TrackerStores {
        TrackerStores {
            locations: self.locations.clone(),
            state: self.state.clone(),
            ephemeral: self.ephemeral.clone(),
            ledger: self.ledger.clone(),
            totals: self.totals.clone(),
            relations: self.relations.clone(),
            scores: self.scores.clone(),
            clock: self.clock.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_consume_keeps_concurrent_additions() {
        let totals = MemoryEphemeralTotals::default();
        let pair = PairKey::new("a", "b");

        totals.add(&pair, Uuid::new_v4(), 100).await.unwrap();
        let snapshot = totals.pending().await.unwrap();
        assert_eq!(snapshot, vec![(pair.clone(), 100)]);

        // 读取之后、扣除之前又累加了一次
        totals.add(&pair, Uuid::new_v4(), 40).await.unwrap();
        let remaining = totals.consume(&pair, 100).await.unwrap();

        assert_eq!(remaining, 40);
        assert_eq!(totals.value(&pair), 40);
    }

    #[tokio::test]
    async fn test_consume_removes_empty_entry() {
        let totals = MemoryEphemeralTotals::default();
        let pair = PairKey::new("a", "b");

        totals.add(&pair, Uuid::new_v4(), 100).await.unwrap();
        assert_eq!(totals.consume(&pair, 100).await.unwrap(), 0);
        assert!(totals.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_session_accrues_once() {
        let totals = MemoryEphemeralTotals::default();
        let pair = PairKey::new("a", "b");
        let session_id = Uuid::new_v4();

        assert!(totals.add(&pair, session_id, 100).await.unwrap());
        assert!(!totals.add(&pair, session_id, 100).await.unwrap());

        assert_eq!(totals.value(&pair), 100);
    }

    #[tokio::test]
    async fn test_ledger_never_reopens_closed_session() {
        let ledger = MemoryLedger::default();
        let id = ledger.open("a", "b", 1_000).await.unwrap();

        let closed = ledger.close(id, 4_000).await.unwrap().unwrap();
        assert_eq!(closed.duration_ms, Some(3_000));

        assert!(ledger.close(id, 9_000).await.unwrap().is_none());
        assert_eq!(ledger.all()[0].end_time, Some(4_000));
        assert!(!ledger.is_open(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_nearby_filters_by_radius() {
        let locations = MemoryLocationStore::default();
        locations.set_position("a", 121.0, 31.0).await.unwrap();
        locations.set_position("b", 121.0, 31.0005).await.unwrap();
        locations.set_position("c", 121.0, 31.01).await.unwrap();

        let ids: Vec<String> = locations
            .nearby("a", 100.0)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.user_id)
            .collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
