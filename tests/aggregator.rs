mod common;

use chrono::{DateTime, Utc};
use common::{SIX_HOURS_MS, T0, place, setup};
use geotrack::database::models::UserProximityTotal;
use geotrack::models::PairKey;
use geotrack::store::{ProximityTotals, RelationStore};

fn total_row(user_id: &str, peer_id: &str, total_ms: i64) -> UserProximityTotal {
    UserProximityTotal {
        user_id: user_id.to_string(),
        nearby_user_id: peer_id.to_string(),
        total_duration_ms: total_ms,
        session_count: 3,
        last_session_at: DateTime::<Utc>::from_timestamp_millis(T0).unwrap(),
    }
}

#[tokio::test]
async fn test_flush_moves_pending_into_totals() {
    let (backend, tracker) = setup();
    let ab = PairKey::new("a", "b");
    let ac = PairKey::new("a", "c");
    backend.totals.insert_raw(total_row("a", "b", 1_000));
    backend.ephemeral.insert_raw(ab.clone(), 2_500);
    backend.ephemeral.insert_raw(ac.clone(), 700);

    let report = tracker.aggregate().await.unwrap();

    assert_eq!(report.flushed, 2);
    assert_eq!(report.flushed_ms, 3_200);
    let ab_total = backend.totals.total(&ab).await.unwrap().unwrap();
    assert_eq!(ab_total.total_duration_ms, 3_500);
    assert_eq!(ab_total.session_count, 4);
    assert_eq!(
        ab_total.last_session_at,
        DateTime::<Utc>::from_timestamp_millis(T0).unwrap()
    );
    let ac_total = backend.totals.total(&ac).await.unwrap().unwrap();
    assert_eq!(ac_total.total_duration_ms, 700);
    assert_eq!(ac_total.session_count, 1);

    assert_eq!(backend.ephemeral.value(&ab), 0);
    assert_eq!(backend.ephemeral.value(&ac), 0);
}

#[tokio::test]
async fn test_zero_entry_is_skipped() {
    let (backend, tracker) = setup();
    let pair = PairKey::new("a", "b");
    backend.ephemeral.insert_raw(pair.clone(), 0);

    let report = tracker.aggregate().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.flushed, 0);
    assert_eq!(report.failed, 0);
    assert!(backend.totals.total(&pair).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_upsert_keeps_pending_time() {
    let (backend, tracker) = setup();
    let pair = PairKey::new("a", "b");
    backend.ephemeral.insert_raw(pair.clone(), 4_000);
    backend.totals.set_unavailable(true);

    let report = tracker.aggregate().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(backend.ephemeral.value(&pair), 4_000);

    backend.totals.set_unavailable(false);
    let report = tracker.aggregate().await.unwrap();
    assert_eq!(report.flushed, 1);
    assert_eq!(backend.ephemeral.value(&pair), 0);
    let total = backend.totals.total(&pair).await.unwrap().unwrap();
    assert_eq!(total.total_duration_ms, 4_000);
}

#[tokio::test]
async fn test_crossing_threshold_promotes_exactly_once() {
    let (backend, tracker) = setup();
    let pair = PairKey::new("a", "b");
    backend.totals.insert_raw(total_row("a", "b", SIX_HOURS_MS - 1));

    backend.ephemeral.insert_raw(pair.clone(), 2);
    let report = tracker.aggregate().await.unwrap();
    assert_eq!(report.promoted, 1);

    let related = backend.relations.find_related(&pair).await.unwrap().unwrap();
    assert_eq!(related.spent_time_ms, SIX_HOURS_MS + 1);

    backend.ephemeral.insert_raw(pair.clone(), 60_000);
    let report = tracker.aggregate().await.unwrap();
    assert_eq!(report.promoted, 0);
    assert_eq!(report.refreshed, 1);

    assert_eq!(backend.relations.count(), 1);
    let related = backend.relations.find_related(&pair).await.unwrap().unwrap();
    assert_eq!(related.spent_time_ms, SIX_HOURS_MS + 60_001);
    // 反向关系不会自动建立
    assert!(
        backend
            .relations
            .find_related(&pair.reversed())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_below_threshold_is_not_promoted() {
    let (backend, tracker) = setup();
    let pair = PairKey::new("a", "b");
    backend.ephemeral.insert_raw(pair.clone(), SIX_HOURS_MS - 1);

    let report = tracker.aggregate().await.unwrap();

    assert_eq!(report.flushed, 1);
    assert_eq!(report.promoted, 0);
    assert_eq!(backend.relations.count(), 0);
}

#[tokio::test]
async fn test_six_hours_together_relates_both_directions() {
    let (backend, tracker) = setup();
    backend.scores.set_components("a", 100, 100, 200);
    backend.scores.set_components("b", 200, 200, 200);
    place(&backend, "a", 0.0).await;
    place(&backend, "b", 50.0).await;
    tracker.sweep().await.unwrap();

    backend.clock.advance(SIX_HOURS_MS);
    place(&backend, "b", 2_000.0).await;
    tracker.sweep().await.unwrap();

    let report = tracker.aggregate().await.unwrap();
    assert_eq!(report.flushed, 2);
    assert_eq!(report.promoted, 2);

    let related: Vec<String> = tracker
        .related_users("a")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.related_user_id)
        .collect();
    assert_eq!(related, vec!["b".to_string()]);

    let stats = tracker.proximity_stats("a").await.unwrap();
    assert_eq!(stats.total_time_ms, SIX_HOURS_MS);
    assert_eq!(stats.total_sessions, 1);
    assert_eq!(stats.unique_contacts, 1);

    // 两个方向都有关系，关系分都已计算
    assert!(tracker.relation_score("a").await.unwrap().is_some());
    assert!(tracker.relation_score("b").await.unwrap().is_some());
}
