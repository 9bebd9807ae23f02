//! Integration tests for scoring, suggestions and slot finding through the
//! engine facade.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use focusline_core::storage::Config;
use focusline_core::{
    AttentionModel, AttentionType, CoreError, ManualClock, NewItem, Priority, ProposedChange, Role,
    RoleFitScorer, SuggestionEngine, SuggestionKind, TimelineEngine, WorkItem, Zone,
    MAX_DURATION_MINUTES,
};
use proptest::prelude::*;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
}

fn engine() -> TimelineEngine {
    let clock = Arc::new(ManualClock::new(at(7, 0)));
    TimelineEngine::in_memory(&Config::default(), clock).unwrap()
}

async fn add(engine: &TimelineEngine, new: NewItem) -> WorkItem {
    engine.create_item(new).await.unwrap()
}

fn new_item(title: &str, start: DateTime<Utc>, minutes: i64, kind: AttentionType) -> NewItem {
    NewItem::new("ana", title, start, minutes, kind, "main")
}

#[tokio::test]
async fn test_maker_meeting_day_gets_focus_block() {
    let engine = engine();
    for (title, hour) in [("standup", 10), ("sync", 13), ("review", 15)] {
        add(&engine, new_item(title, at(hour, 0), 30, AttentionType::Connect).meeting()).await;
    }

    let suggestions = engine
        .suggest("ana", day(), Role::Maker, Zone::Peacetime)
        .await
        .unwrap();

    let first = &suggestions[0];
    assert_eq!(first.kind, SuggestionKind::Schedule);
    assert_eq!(first.priority, Priority::High);
    assert!(first.target_item_ids.is_empty());
    assert!(suggestions.iter().all(|s| s.kind != SuggestionKind::Delegate));
    // Three meetings is exactly the Maker limit
    assert!(suggestions.iter().all(|s| s.kind != SuggestionKind::Reschedule));
}

#[tokio::test]
async fn test_multiplier_long_creation_delegated_once() {
    let engine = engine();
    let item = add(&engine, new_item("deck", at(14, 0), 90, AttentionType::Create)).await;

    let suggestions = engine
        .suggest("ana", day(), Role::Multiplier, Zone::Peacetime)
        .await
        .unwrap();

    let delegates: Vec<_> = suggestions
        .iter()
        .filter(|s| s.kind == SuggestionKind::Delegate)
        .collect();
    assert_eq!(delegates.len(), 1);
    assert_eq!(delegates[0].target_item_ids, vec![item.id.clone()]);
    assert_eq!(delegates[0].time_debt_minutes, 30);
    assert_eq!(
        delegates[0].proposed_change,
        ProposedChange::Delegate {
            item_id: item.id.clone(),
            duration_minutes: 90,
        }
    );
}

#[tokio::test]
async fn test_protected_item_never_moved_or_delegated() {
    let engine = engine();
    let protected = add(
        &engine,
        new_item("board prep", at(9, 0), 90, AttentionType::Create).protected(),
    )
    .await;
    let call = add(
        &engine,
        new_item("vendor call", at(10, 0), 30, AttentionType::Connect).meeting(),
    )
    .await;

    let suggestions = engine
        .suggest("ana", day(), Role::Multiplier, Zone::Peacetime)
        .await
        .unwrap();

    let protect = suggestions
        .iter()
        .find(|s| s.kind == SuggestionKind::Protect)
        .unwrap();
    assert_eq!(protect.priority, Priority::High);
    assert_eq!(protect.target_item_ids, vec![protected.id.clone()]);
    assert_eq!(protect.time_debt_minutes, 30);
    assert_eq!(
        protect.proposed_change,
        ProposedChange::Protect {
            item_id: protected.id.clone(),
            conflicting_ids: vec![call.id.clone()],
        }
    );
    assert!(suggestions.iter().all(|s| {
        !matches!(s.kind, SuggestionKind::Reschedule | SuggestionKind::Delegate)
            || !s.target_item_ids.contains(&protected.id)
    }));
}

#[tokio::test]
async fn test_wartime_tightens_meeting_limit() {
    let engine = engine();
    for hour in [9, 11, 13] {
        add(&engine, new_item("meet", at(hour, 0), 30, AttentionType::Connect).meeting()).await;
    }

    let peace = engine
        .suggest("ana", day(), Role::Maker, Zone::Peacetime)
        .await
        .unwrap();
    let war = engine
        .suggest("ana", day(), Role::Maker, Zone::Wartime)
        .await
        .unwrap();

    let moves = |list: &[focusline_core::OptimizationSuggestion]| {
        list.iter()
            .filter(|s| s.kind == SuggestionKind::Reschedule)
            .count()
    };
    assert_eq!(moves(&peace), 0);
    // Wartime Maker allows one meeting
    assert_eq!(moves(&war), 2);
}

#[tokio::test]
async fn test_each_item_targeted_at_most_once() {
    let engine = engine();
    add(&engine, new_item("build", at(8, 0), 200, AttentionType::Create)).await;
    add(&engine, new_item("call", at(10, 0), 20, AttentionType::Connect).meeting()).await;
    add(&engine, new_item("ping", at(10, 25), 20, AttentionType::Connect)).await;
    add(&engine, new_item("mail", at(14, 0), 15, AttentionType::Administer)).await;
    add(&engine, new_item("forms", at(14, 20), 15, AttentionType::Administer)).await;

    for role in [Role::Maker, Role::Marker, Role::Multiplier] {
        let suggestions = engine
            .suggest("ana", day(), role, Zone::Peacetime)
            .await
            .unwrap();
        let mut seen = std::collections::HashSet::new();
        for s in &suggestions {
            for id in &s.target_item_ids {
                assert!(seen.insert(id.clone()), "{id} targeted twice for {role}");
            }
        }
    }
}

#[tokio::test]
async fn test_suggest_is_deterministic() {
    let engine = engine();
    add(&engine, new_item("a", at(9, 0), 20, AttentionType::Decide)).await;
    add(&engine, new_item("b", at(11, 0), 20, AttentionType::Decide)).await;
    add(&engine, new_item("c", at(15, 0), 20, AttentionType::Decide)).await;
    add(&engine, new_item("d", at(16, 0), 200, AttentionType::Create)).await;

    let first = engine
        .suggest("ana", day(), Role::Marker, Zone::Peacetime)
        .await
        .unwrap();
    let second = engine
        .suggest("ana", day(), Role::Marker, Zone::Peacetime)
        .await
        .unwrap();
    assert!(!first.is_empty());
    assert_eq!(first, second);

    // Input order does not matter either
    let mut items = engine.list_live("ana", Some(day())).await.unwrap();
    items.reverse();
    let budget = AttentionModel::new().resolve(Role::Marker, Zone::Peacetime);
    assert_eq!(SuggestionEngine::new().suggest(day(), &items, &budget), first);
}

#[tokio::test]
async fn test_parked_items_leave_analysis() {
    let engine = engine();
    add(&engine, new_item("old", at(0, 0), 30, AttentionType::Administer)).await;
    engine
        .run_sweep(Some(at(0, 30) + Duration::minutes(480)))
        .await
        .unwrap();

    let score = engine
        .score_day("ana", day(), Role::Maker, Zone::Peacetime)
        .await
        .unwrap();
    assert_eq!(score.overall, 50);
    assert_eq!(engine.list_parked("ana").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_find_slot_defaults_and_explicit_role() {
    let engine = engine();
    add(&engine, new_item("standup", at(9, 0), 30, AttentionType::Connect).meeting()).await;

    let default_role = engine
        .find_slot("ana", AttentionType::Create, 60, day(), None, None)
        .await
        .unwrap();
    // Maker peak 09-12; the meeting pushes create work to 09:30
    assert_eq!(default_role[0].start_time, at(9, 30));

    let marker = engine
        .find_slot("ana", AttentionType::Create, 60, day(), Some(Role::Marker), None)
        .await
        .unwrap();
    // Marker peak starts at 10
    assert_eq!(marker[0].start_time, at(10, 0));
}

#[tokio::test]
async fn test_out_of_range_durations_rejected_up_front() {
    let engine = engine();
    for minutes in [MAX_DURATION_MINUTES + 1, 3_000_000_000] {
        let err = engine
            .create_item(new_item("forever", at(9, 0), minutes, AttentionType::Create))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)), "{err}");
    }
    assert!(engine.list_live("ana", None).await.unwrap().is_empty());

    let err = engine
        .find_slot("ana", AttentionType::Create, i64::MAX, day(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput(_)), "{err}");
}

#[tokio::test]
async fn test_day_long_items_analysed_for_every_role() {
    let engine = engine();
    for (title, kind) in [
        ("a", AttentionType::Create),
        ("b", AttentionType::Create),
        ("c", AttentionType::Decide),
    ] {
        add(&engine, new_item(title, at(0, 0), MAX_DURATION_MINUTES, kind)).await;
    }

    for role in [Role::Maker, Role::Marker, Role::Multiplier] {
        for zone in [Zone::Peacetime, Zone::Wartime] {
            let score = engine.score_day("ana", day(), role, zone).await.unwrap();
            assert!(score.overall <= 100);
            engine.suggest("ana", day(), role, zone).await.unwrap();
        }
    }
    let slots = engine
        .find_slot("ana", AttentionType::Create, MAX_DURATION_MINUTES, day(), None, None)
        .await
        .unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn test_extreme_role_overrides() {
    let mut config = Config::default();
    assert!(config
        .set("roles.maker.min_focus_block_minutes", "4000000000")
        .is_err());

    // The largest accepted limits still resolve in Wartime
    config.set("roles.maker.min_focus_block_minutes", "1440").unwrap();
    config.set("roles.multiplier.max_personal_creation_minutes", "1440").unwrap();
    let clock = Arc::new(ManualClock::new(at(7, 0)));
    let engine = TimelineEngine::in_memory(&config, clock).unwrap();
    add(&engine, new_item("deep", at(9, 0), 600, AttentionType::Create)).await;

    let war = engine.budget(Some(Role::Maker), Some(Zone::Wartime));
    assert_eq!(war.min_focus_block_minutes, 1152);
    for role in [Role::Maker, Role::Multiplier] {
        engine.score_day("ana", day(), role, Zone::Wartime).await.unwrap();
        engine.suggest("ana", day(), role, Zone::Wartime).await.unwrap();
    }
}

fn arb_item() -> impl Strategy<Value = WorkItem> {
    let kinds = prop_oneof![
        Just(AttentionType::Create),
        Just(AttentionType::Decide),
        Just(AttentionType::Connect),
        Just(AttentionType::Administer),
        Just(AttentionType::Consume),
    ];
    (0i64..(22 * 60), 1i64..300, kinds, any::<bool>(), any::<bool>()).prop_map(
        |(offset, minutes, kind, meeting, protected)| {
            let start = at(0, 0) + Duration::minutes(offset);
            let mut new = NewItem::new("ana", "item", start, minutes, kind, "main");
            new.is_meeting = meeting;
            new.non_negotiable = protected;
            WorkItem::from_new(new, start).unwrap()
        },
    )
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Maker), Just(Role::Marker), Just(Role::Multiplier)]
}

proptest! {
    #[test]
    fn prop_score_in_range_and_pure(
        items in proptest::collection::vec(arb_item(), 0..25),
        role in arb_role(),
        wartime in any::<bool>(),
    ) {
        let zone = if wartime { Zone::Wartime } else { Zone::Peacetime };
        let budget = AttentionModel::new().resolve(role, zone);
        let scorer = RoleFitScorer::new();

        let first = scorer.score(&items, &budget);
        let second = scorer.score(&items, &budget);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.overall <= 100);
        for (_, value) in first.breakdown.axes() {
            prop_assert!(value <= 100);
        }
    }

    #[test]
    fn prop_suggestions_respect_protection(
        items in proptest::collection::vec(arb_item(), 0..25),
        role in arb_role(),
    ) {
        let budget = AttentionModel::new().resolve(role, Zone::Peacetime);
        let suggestions = SuggestionEngine::new().suggest(day(), &items, &budget);

        let mut targeted = std::collections::HashSet::new();
        for s in &suggestions {
            for id in &s.target_item_ids {
                prop_assert!(targeted.insert(id.clone()));
                let item = items.iter().find(|item| &item.id == id).unwrap();
                if item.non_negotiable {
                    prop_assert!(!matches!(s.kind, SuggestionKind::Reschedule | SuggestionKind::Delegate));
                }
            }
        }
        prop_assert_eq!(suggestions, SuggestionEngine::new().suggest(day(), &items, &budget));
    }
}
