mod common;

use std::sync::Arc;

use common::setup;
use geotrack::models::{PairKey, ProximityEvent};
use geotrack::store::EphemeralTotals;
use geotrack::tracker::PairOutcome;
use tokio::sync::Notify;
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_accrual_and_flush_lose_nothing() {
    let (backend, tracker) = setup();
    let tracker = Arc::new(tracker);
    let pair = PairKey::new("a", "b");
    let done = Arc::new(Notify::new());

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let ephemeral = backend.ephemeral.clone();
            let pair = pair.clone();
            tokio::spawn(async move {
                let mut sum = 0i64;
                for i in 0..250 {
                    let amount = (w * 1000 + i + 1) as i64;
                    ephemeral.add(&pair, Uuid::new_v4(), amount).await.unwrap();
                    sum += amount;
                    tokio::task::yield_now().await;
                }
                sum
            })
        })
        .collect();

    let flusher = {
        let tracker = tracker.clone();
        let done = done.clone();
        tokio::spawn(async move {
            loop {
                tracker.aggregate().await.unwrap();
                tokio::select! {
                    _ = done.notified() => break,
                    _ = tokio::task::yield_now() => {}
                }
            }
        })
    };

    let mut expected = 0i64;
    for writer in writers {
        expected += writer.await.unwrap();
    }
    done.notify_one();
    flusher.await.unwrap();

    // 收尾：把剩余的临时计数也写入
    tracker.aggregate().await.unwrap();

    let history = tracker.pair_history("a", "b").await.unwrap();
    assert_eq!(history.total.unwrap().total_duration_ms, expected);
    assert_eq!(backend.ephemeral.value(&pair), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exits_racing_aggregation_are_all_counted() {
    let (backend, tracker) = setup();
    let tracker = Arc::new(tracker);
    let pair = PairKey::new("a", "b");
    let done = Arc::new(Notify::new());

    let encounters = {
        let tracker = tracker.clone();
        let clock = backend.clock.clone();
        tokio::spawn(async move {
            let mut sum = 0i64;
            for i in 0..100 {
                tracker
                    .handle_event("a", "b", ProximityEvent::Enter)
                    .await
                    .unwrap();
                clock.advance(1_000 + i);
                match tracker
                    .handle_event("a", "b", ProximityEvent::Exit)
                    .await
                    .unwrap()
                {
                    PairOutcome::Exited { duration_ms } => sum += duration_ms,
                    other => panic!("unexpected outcome {:?}", other),
                }
            }
            sum
        })
    };

    let flusher = {
        let tracker = tracker.clone();
        let done = done.clone();
        tokio::spawn(async move {
            loop {
                tracker.aggregate().await.unwrap();
                tokio::select! {
                    _ = done.notified() => break,
                    _ = tokio::task::yield_now() => {}
                }
            }
        })
    };

    let expected = encounters.await.unwrap();
    done.notify_one();
    flusher.await.unwrap();
    tracker.aggregate().await.unwrap();

    let history = tracker.pair_history("a", "b").await.unwrap();
    assert_eq!(history.sessions.len(), 100);
    assert!(history.sessions.iter().all(|s| !s.is_open()));
    assert_eq!(history.total.unwrap().total_duration_ms, expected);
    assert_eq!(backend.ephemeral.value(&pair), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_enter_opens_one_session() {
    let (backend, tracker) = setup();
    let tracker = Arc::new(tracker);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                tracker
                    .handle_event("a", "b", ProximityEvent::Enter)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut entered = 0;
    for handle in handles {
        if handle.await.unwrap() == PairOutcome::Entered {
            entered += 1;
        }
    }

    assert_eq!(entered, 1);
    assert_eq!(backend.ledger.open_count(&PairKey::new("a", "b")), 1);
}
