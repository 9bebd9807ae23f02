//! Integration tests for item lifecycle: sweep, parking and races against
//! live mutations.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use focusline_core::lifecycle::RetryPolicy;
use focusline_core::storage::{
    ItemStore, MemoryCompletionSink, MemoryItemStore, Partition, StoreOp,
};
use focusline_core::{
    AttentionType, ItemStatus, LifecycleManager, ManualClock, MutationOutcome, NewItem, WorkItem,
};

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
}

struct Harness {
    manager: Arc<LifecycleManager>,
    store: Arc<MemoryItemStore>,
    clock: Arc<ManualClock>,
    sink: Arc<MemoryCompletionSink>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryItemStore::new());
    let clock = Arc::new(ManualClock::new(at(8, 0)));
    let sink = Arc::new(MemoryCompletionSink::new());
    let manager = LifecycleManager::new(store.clone())
        .with_clock(clock.clone())
        .with_sink(sink.clone())
        .with_retry(RetryPolicy::new(2, std::time::Duration::from_millis(1)));
    Harness {
        manager: Arc::new(manager),
        store,
        clock,
        sink,
    }
}

async fn create(h: &Harness, owner: &str, start: DateTime<Utc>, minutes: i64) -> WorkItem {
    h.manager
        .create_item(NewItem::new(owner, "task", start, minutes, AttentionType::Create, "main"))
        .await
        .unwrap()
}

/// Each id lives in exactly one partition.
async fn assert_one_partition(store: &MemoryItemStore, ids: &[String]) {
    for id in ids {
        let live = store.get_live(id).await.unwrap();
        let parked = store.get_parked(id).await.unwrap();
        assert!(
            live.is_some() != parked.is_some(),
            "item {id} live={} parked={}",
            live.is_some(),
            parked.is_some()
        );
        if let Some(item) = live {
            assert_ne!(item.status, ItemStatus::Parked);
        }
        if let Some(item) = parked {
            assert_eq!(item.status, ItemStatus::Parked);
        }
    }
}

#[tokio::test]
async fn test_park_boundary_is_inclusive() {
    let h = harness();
    // Ends at 09:00; park threshold is 480 minutes
    let item = create(&h, "ana", at(8, 0), 60).await;

    let report = h
        .manager
        .run_sweep(at(9, 0) + Duration::minutes(479))
        .await
        .unwrap();
    assert_eq!(report.parked, 0);
    assert_eq!(report.logjammed, 1);
    let live = h.store.get_live(&item.id).await.unwrap().unwrap();
    assert_eq!(live.status, ItemStatus::Logjam);

    let report = h
        .manager
        .run_sweep(at(9, 0) + Duration::minutes(480))
        .await
        .unwrap();
    assert_eq!(report.parked, 1);
    let parked = h.store.get_parked(&item.id).await.unwrap().unwrap();
    assert_eq!(parked.status, ItemStatus::Parked);
    assert_eq!(parked.parked_at, Some(at(9, 0) + Duration::minutes(480)));
    assert!(h.store.get_live(&item.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let h = harness();
    let mut ids = Vec::new();
    for (owner, hour) in [("ana", 6), ("ana", 12), ("bo", 7), ("bo", 14), ("cy", 16)] {
        ids.push(create(&h, owner, at(hour, 0), 45).await.id);
    }
    let now = at(22, 0);

    let first = h.manager.run_sweep(now).await.unwrap();
    assert!(first.parked > 0);
    let snapshot_live = h.store.list_live("ana", None).await.unwrap();
    let snapshot_parked = h.store.list_parked("ana").await.unwrap();
    let counts = h.store.counts();

    let second = h.manager.run_sweep(now).await.unwrap();
    assert_eq!(second.parked, 0);
    assert_eq!(second.logjammed, 0);
    assert_eq!(second.reconciled, 0);
    assert_eq!(h.store.counts(), counts);
    assert_eq!(h.store.list_live("ana", None).await.unwrap(), snapshot_live);
    assert_eq!(h.store.list_parked("ana").await.unwrap(), snapshot_parked);
    assert_one_partition(&h.store, &ids).await;
}

#[tokio::test]
async fn test_complete_races_sweep() {
    for _ in 0..20 {
        let h = harness();
        let item = create(&h, "ana", at(0, 0), 30).await;
        let now = at(0, 30) + Duration::minutes(480);
        h.clock.set(now);

        let sweeper = {
            let manager = Arc::clone(&h.manager);
            tokio::spawn(async move { manager.run_sweep(now).await })
        };
        let completer = {
            let manager = Arc::clone(&h.manager);
            let id = item.id.clone();
            tokio::spawn(async move { manager.complete_item(&id, None).await })
        };

        let report = sweeper.await.unwrap().unwrap();
        let outcome = completer.await.unwrap().unwrap();
        match outcome {
            MutationOutcome::Success(done) => {
                assert_eq!(done.status, ItemStatus::Completed);
                assert_eq!(report.parked, 0);
                let live = h.store.get_live(&item.id).await.unwrap().unwrap();
                assert_eq!(live.status, ItemStatus::Completed);
            }
            MutationOutcome::AlreadyParked(parked) => {
                assert_eq!(parked.status, ItemStatus::Parked);
                assert_eq!(report.parked, 1);
                assert!(h.sink.records().is_empty());
            }
            MutationOutcome::NotFound => panic!("item vanished during race"),
        }
        assert_one_partition(&h.store, &[item.id.clone()]).await;
    }
}

#[tokio::test]
async fn test_mutations_on_parked_item_redirect() {
    let h = harness();
    let item = create(&h, "ana", at(0, 0), 30).await;
    h.manager
        .run_sweep(at(0, 30) + Duration::minutes(480))
        .await
        .unwrap();

    let outcome = h
        .manager
        .reschedule_item(&item.id, at(15, 0), None)
        .await
        .unwrap();
    assert!(matches!(outcome, MutationOutcome::AlreadyParked(_)));
    let message = outcome.redirect_message().unwrap();
    assert!(message.starts_with("this item moved to the parked list"));
    assert!(message.contains(&item.id));

    // Parked copy untouched
    let parked = h.store.get_parked(&item.id).await.unwrap().unwrap();
    assert_eq!(parked.start_time, at(0, 0));
}

#[tokio::test]
async fn test_unpark_restores_and_shields() {
    let h = harness();
    let item = create(&h, "ana", at(0, 0), 30).await;
    let parked_at = at(0, 30) + Duration::minutes(480);
    h.manager.run_sweep(parked_at).await.unwrap();

    h.clock.set(parked_at + Duration::minutes(5));
    let outcome = h.manager.unpark_item(&item.id, None).await.unwrap();
    let restored = outcome.item().unwrap().clone();
    assert!(outcome.is_success());
    assert_eq!(restored.status, ItemStatus::Logjam);
    assert_eq!(restored.parked_at, None);
    assert_eq!(restored.unparked_at, Some(parked_at + Duration::minutes(5)));

    // Inside the grace period the sweep leaves it alone
    let report = h
        .manager
        .run_sweep(parked_at + Duration::minutes(30))
        .await
        .unwrap();
    assert_eq!(report.parked, 0);
    let located = h.manager.get_item(&item.id).await.unwrap().unwrap();
    assert_eq!(located.partition, Partition::Live);

    // After it, the item parks again
    let report = h
        .manager
        .run_sweep(parked_at + Duration::minutes(70))
        .await
        .unwrap();
    assert_eq!(report.parked, 1);
}

#[tokio::test]
async fn test_long_completion_skips_record() {
    let h = harness();
    let item = create(&h, "ana", at(0, 0), 60).await;
    h.clock.set(at(0, 0) + Duration::minutes(1500));

    let outcome = h.manager.complete_item(&item.id, None).await.unwrap();
    assert_eq!(outcome.item().unwrap().status, ItemStatus::Completed);
    assert!(h.sink.records().is_empty());
}

#[tokio::test]
async fn test_interrupted_relocation_reconciled() {
    let h = harness();
    let item = create(&h, "ana", at(0, 0), 30).await;
    // Parked insert succeeds, removing the live copy does not
    h.store.fail_next(StoreOp::DeleteLive, 2);

    let now = at(0, 30) + Duration::minutes(480);
    let report = h.manager.run_sweep(now).await.unwrap();
    assert_eq!(report.parked, 1);
    assert!(h.store.get_live(&item.id).await.unwrap().is_some());
    assert!(h.store.get_parked(&item.id).await.unwrap().is_some());

    // Readers already see one copy
    let located = h.manager.get_item(&item.id).await.unwrap().unwrap();
    assert_eq!(located.item.id, item.id);

    let report = h.manager.run_sweep(now).await.unwrap();
    assert_eq!(report.reconciled, 1);
    assert_one_partition(&h.store, &[item.id.clone()]).await;
    assert_eq!(h.store.counts(), (0, 1));
}

#[tokio::test]
async fn test_mutation_reconciles_stale_claim_first() {
    let h = harness();
    let item = create(&h, "ana", at(0, 0), 30).await;
    h.store.fail_next(StoreOp::DeleteLive, 2);
    h.manager
        .run_sweep(at(0, 30) + Duration::minutes(480))
        .await
        .unwrap();

    let outcome = h.manager.complete_item(&item.id, None).await.unwrap();
    assert!(matches!(outcome, MutationOutcome::AlreadyParked(_)));
    assert_eq!(h.store.counts(), (0, 1));
}

#[tokio::test]
async fn test_stale_claim_repaired_outside_time_budget() {
    let h = harness();
    let item = create(&h, "ana", at(0, 0), 30).await;
    h.store.fail_next(StoreOp::DeleteLive, 2);
    h.manager
        .run_sweep(at(0, 30) + Duration::minutes(480))
        .await
        .unwrap();
    assert_eq!(h.store.counts(), (1, 1));

    // The repair completes even with no time budget left
    let outcome = h
        .manager
        .reschedule_item(&item.id, at(15, 0), Some(std::time::Duration::ZERO))
        .await
        .unwrap();
    assert!(matches!(outcome, MutationOutcome::AlreadyParked(_)));
    assert_eq!(h.store.counts(), (0, 1));
    assert_one_partition(&h.store, &[item.id.clone()]).await;
}

#[tokio::test]
async fn test_zero_timeout_never_half_writes() {
    let h = harness();
    let item = create(&h, "ana", at(9, 0), 30).await;
    h.clock.set(at(9, 30));

    // No time budget: each call either commits or times out before writing
    let mut results = Vec::new();
    for _ in 0..10 {
        let manager = Arc::clone(&h.manager);
        let id = item.id.clone();
        results.push(tokio::spawn(async move {
            manager
                .complete_item(&id, Some(std::time::Duration::ZERO))
                .await
        }));
    }

    for handle in results {
        match handle.await.unwrap() {
            Ok(outcome) => assert!(outcome.is_success()),
            Err(err) => assert!(err.is_retryable(), "unexpected error {err}"),
        }
    }
    let live = h.store.get_live(&item.id).await.unwrap().unwrap();
    assert_eq!(live.status, ItemStatus::Completed);
    assert_eq!(h.sink.records().len(), 1);
}
