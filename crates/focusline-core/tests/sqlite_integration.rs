//! Lifecycle and analysis over the SQLite store and JSON-lines completion
//! log, both on disk.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use focusline_core::storage::{Config, ItemStore, JsonlCompletionSink, SqliteItemStore};
use focusline_core::{
    AttentionType, ItemStatus, ManualClock, MutationOutcome, NewItem, Partition, Role,
    TimelineEngine, Zone,
};
use tempfile::TempDir;

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
}

struct Disk {
    dir: TempDir,
    clock: Arc<ManualClock>,
}

impl Disk {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            clock: Arc::new(ManualClock::new(at(7, 0))),
        }
    }

    fn engine(&self) -> TimelineEngine {
        let store = SqliteItemStore::open_at(&self.dir.path().join("focusline.db")).unwrap();
        let sink = self.sink();
        TimelineEngine::new(
            &Config::default(),
            Arc::new(store),
            Arc::new(sink),
            self.clock.clone(),
        )
        .unwrap()
    }

    fn sink(&self) -> JsonlCompletionSink {
        JsonlCompletionSink::at(self.dir.path().join("completions.jsonl"))
    }
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let disk = Disk::new();
    let (kept, parked) = {
        let engine = disk.engine();
        let kept = engine
            .create_item(NewItem::new("ana", "write", at(14, 0), 60, AttentionType::Create, "main"))
            .await
            .unwrap();
        let parked = engine
            .create_item(NewItem::new("ana", "old", at(0, 0), 30, AttentionType::Consume, "main"))
            .await
            .unwrap();
        let report = engine
            .run_sweep(Some(at(0, 30) + Duration::minutes(480)))
            .await
            .unwrap();
        assert_eq!(report.parked, 1);
        (kept, parked)
    };

    let engine = disk.engine();
    let located = engine.get_item(&kept.id).await.unwrap().unwrap();
    assert_eq!(located.partition, Partition::Live);
    assert_eq!(located.item, kept);

    let located = engine.get_item(&parked.id).await.unwrap().unwrap();
    assert_eq!(located.partition, Partition::Parked);
    assert_eq!(located.item.status, ItemStatus::Parked);
}

#[tokio::test]
async fn test_completion_appends_to_log() {
    let disk = Disk::new();
    let engine = disk.engine();
    let item = engine
        .create_item(NewItem::new("ana", "review", at(9, 0), 45, AttentionType::Decide, "main"))
        .await
        .unwrap();

    disk.clock.set(at(9, 50));
    let outcome = engine.complete_item(&item.id).await.unwrap();
    assert!(matches!(outcome, MutationOutcome::Success(_)));
    // Completing twice is a no-op
    engine.complete_item(&item.id).await.unwrap();

    let records = disk.sink().read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].item_id, item.id);
    assert_eq!(records[0].planned_minutes, 45);
    assert_eq!(records[0].actual_minutes, 50);
}

#[tokio::test]
async fn test_unpark_roundtrip_on_disk() {
    let disk = Disk::new();
    let engine = disk.engine();
    let item = engine
        .create_item(NewItem::new("ana", "old", at(0, 0), 30, AttentionType::Consume, "main"))
        .await
        .unwrap();
    let parked_at = at(0, 30) + Duration::minutes(480);
    engine.run_sweep(Some(parked_at)).await.unwrap();

    disk.clock.set(parked_at + Duration::minutes(1));
    let outcome = engine.unpark_item(&item.id).await.unwrap();
    assert!(outcome.is_success());

    let store = SqliteItemStore::open_at(&disk.dir.path().join("focusline.db")).unwrap();
    assert!(store.get_parked(&item.id).await.unwrap().is_none());
    let live = store.get_live(&item.id).await.unwrap().unwrap();
    assert_eq!(live.unparked_at, Some(parked_at + Duration::minutes(1)));
}

#[tokio::test]
async fn test_score_reads_sqlite_snapshot() {
    let disk = Disk::new();
    let engine = disk.engine();
    for (hour, kind) in [(9, AttentionType::Create), (11, AttentionType::Decide)] {
        engine
            .create_item(NewItem::new("ana", "deep", at(hour, 0), 90, kind, "main"))
            .await
            .unwrap();
    }

    let score = engine
        .score_day("ana", at(0, 0).date_naive(), Role::Maker, Zone::Peacetime)
        .await
        .unwrap();
    assert!(score.overall > 50);
    assert!(score.breakdown.energy_alignment >= 50);
}
