//! Individual suggestion rules. Each rule is pure and may return nothing.

use chrono::{DateTime, Duration, Utc};

use super::{DayContext, OptimizationSuggestion, Priority, ProposedChange, SuggestionKind};
use crate::attention::Role;
use crate::scheduler::SlotQuery;
use crate::timeline::{at_hour, AttentionType, WorkItem, MAX_DURATION_MINUTES};

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_minutes()
}

fn clamp_minutes(minutes: i64) -> u32 {
    minutes.clamp(0, u32::MAX as i64) as u32
}

/// Summed in `u64`; a handful of long items can exceed `u32`.
fn sum_minutes<'a, 'b: 'a>(items: impl IntoIterator<Item = &'a &'b WorkItem>) -> u64 {
    items
        .into_iter()
        .map(|item| u64::from(item.planned_duration_minutes))
        .sum()
}

fn saturate(minutes: u64) -> u32 {
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// Runs of back-to-back items, as `(start, end, members)`. `joins` decides
/// whether an item takes part; `max_gap` is the largest pause inside a run.
fn runs<'a>(
    items: impl Iterator<Item = &'a WorkItem>,
    joins: impl Fn(&WorkItem) -> bool,
    max_gap: i64,
) -> Vec<(DateTime<Utc>, DateTime<Utc>, Vec<&'a WorkItem>)> {
    let mut out: Vec<(DateTime<Utc>, DateTime<Utc>, Vec<&'a WorkItem>)> = Vec::new();
    for item in items.filter(|item| joins(item)) {
        match out.last_mut() {
            Some(run) if minutes_between(run.1, item.start_time) <= max_gap => {
                run.1 = run.1.max(item.end_time());
                run.2.push(item);
            }
            _ => out.push((item.start_time, item.end_time(), vec![item])),
        }
    }
    out
}

/// Maker without a long enough focus block gets one scheduled.
pub(super) fn focus_block(ctx: &DayContext<'_>) -> Option<OptimizationSuggestion> {
    if ctx.budget.role != Role::Maker {
        return None;
    }
    let needed = ctx.budget.min_focus_block_minutes;
    let longest = runs(
        ctx.occupied.iter().copied(),
        |item| !item.is_meeting && item.attention_type.is_high_load(),
        ctx.config.focus_gap_tolerance_minutes,
    )
    .iter()
    .map(|(start, end, _)| minutes_between(*start, *end))
    .max()
    .unwrap_or(0);

    if longest >= needed as i64 {
        return None;
    }

    let query = SlotQuery::new(AttentionType::Create, needed as i64, ctx.date);
    let slot = ctx
        .slots
        .find(&query, &ctx.day_items(), ctx.budget)
        .ok()
        .and_then(|slots| slots.into_iter().next());
    let rationale = match &slot {
        Some(slot) => format!(
            "No uninterrupted focus block of {needed} minutes today (longest is {longest}); reserve {} for create work",
            slot.start_time.format("%H:%M")
        ),
        None => format!(
            "No uninterrupted focus block of {needed} minutes today (longest is {longest}) and no free slot fits one"
        ),
    };

    Some(
        OptimizationSuggestion::new(
            SuggestionKind::Schedule,
            Priority::High,
            Vec::new(),
            ProposedChange::Schedule {
                attention_type: AttentionType::Create,
                duration_minutes: needed,
                slot,
            },
            rationale,
        )
        .with_time_debt(clamp_minutes(needed as i64 - longest)),
    )
}

/// Maker over the meeting limit: move the meetings least worth keeping.
pub(super) fn excess_meetings(ctx: &DayContext<'_>) -> Vec<OptimizationSuggestion> {
    if ctx.budget.role != Role::Maker {
        return Vec::new();
    }
    let limit = ctx.budget.max_meetings_per_day as usize;
    let meeting_count = ctx.occupied.iter().filter(|item| item.is_meeting).count();
    if meeting_count <= limit {
        return Vec::new();
    }

    let peak_start = at_hour(ctx.date, ctx.budget.peak_hours_start);
    let peak_end = at_hour(ctx.date, ctx.budget.peak_hours_end);

    let mut movable: Vec<&WorkItem> = ctx
        .targetable()
        .filter(|item| item.is_meeting && !item.non_negotiable)
        .collect();
    // Peak-hour meetings first, then latest start, then id
    movable.sort_by(|a, b| {
        b.intersects(peak_start, peak_end)
            .cmp(&a.intersects(peak_start, peak_end))
            .then_with(|| b.start_time.cmp(&a.start_time))
            .then_with(|| a.id.cmp(&b.id))
    });

    let day_items = ctx.day_items();
    movable
        .into_iter()
        .take(meeting_count - limit)
        .map(|meeting| {
            let query = SlotQuery::new(
                AttentionType::Connect,
                meeting.planned_duration_minutes as i64,
                ctx.date,
            );
            let to = ctx
                .slots
                .find_excluding(&query, &day_items, ctx.budget, &[meeting.id.as_str()])
                .ok()
                .and_then(|slots| {
                    slots
                        .into_iter()
                        .find(|slot| !meeting.intersects(slot.start_time, slot.end_time))
                })
                .map(|slot| slot.start_time)
                .unwrap_or(meeting.start_time + Duration::days(1));

            OptimizationSuggestion::new(
                SuggestionKind::Reschedule,
                Priority::Normal,
                [meeting.id.clone()],
                ProposedChange::Reschedule {
                    item_id: meeting.id.clone(),
                    from: meeting.start_time,
                    to,
                },
                format!(
                    "{meeting_count} meetings today exceed the limit of {limit}; move '{}' to {}",
                    meeting.title,
                    to.format("%Y-%m-%d %H:%M")
                ),
            )
            .with_time_debt(meeting.planned_duration_minutes)
        })
        .collect()
}

/// Marker with decisions scattered over more than two windows.
pub(super) fn batch_decisions(ctx: &DayContext<'_>) -> Option<OptimizationSuggestion> {
    if ctx.budget.role != Role::Marker {
        return None;
    }
    let clusters = runs(
        ctx.targetable(),
        |item| item.attention_type == AttentionType::Decide && !item.non_negotiable,
        ctx.config.batch_adjacency_minutes,
    );
    if clusters.len() <= 2 {
        return None;
    }

    let decisions: Vec<&WorkItem> = clusters
        .iter()
        .flat_map(|(_, _, members)| members.iter().copied())
        .collect();
    let total = sum_minutes(&decisions);
    let largest_cluster = clusters
        .iter()
        .map(|(_, _, members)| sum_minutes(members))
        .max()
        .unwrap_or(0);

    let ids: Vec<&str> = decisions.iter().map(|item| item.id.as_str()).collect();
    let query = SlotQuery::new(
        AttentionType::Decide,
        i64::try_from(total).unwrap_or(i64::MAX),
        ctx.date,
    );
    let slot = ctx
        .slots
        .find_excluding(&query, &ctx.day_items(), ctx.budget, &ids)
        .ok()
        .and_then(|slots| slots.into_iter().next());

    let mut item_ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    item_ids.sort();
    Some(
        OptimizationSuggestion::new(
            SuggestionKind::Batch,
            Priority::Normal,
            item_ids.clone(),
            ProposedChange::Batch {
                item_ids,
                total_minutes: saturate(total),
                slot,
            },
            format!(
                "Decisions are spread over {} separate windows; batch all {} minutes into one",
                clusters.len(),
                total
            ),
        )
        .with_time_debt(saturate(total - largest_cluster)),
    )
}

/// Multiplier doing create work that others should own.
pub(super) fn delegate_creation(ctx: &DayContext<'_>) -> Vec<OptimizationSuggestion> {
    if ctx.budget.role != Role::Multiplier {
        return Vec::new();
    }
    let threshold = ctx.budget.delegation_duration_threshold_minutes;
    let delegable: Vec<&WorkItem> = ctx
        .targetable()
        .filter(|item| item.attention_type == AttentionType::Create && !item.non_negotiable)
        .collect();

    let mut out: Vec<OptimizationSuggestion> = delegable
        .iter()
        .filter(|item| item.planned_duration_minutes > threshold)
        .map(|item| {
            OptimizationSuggestion::new(
                SuggestionKind::Delegate,
                Priority::Normal,
                [item.id.clone()],
                ProposedChange::Delegate {
                    item_id: item.id.clone(),
                    duration_minutes: item.planned_duration_minutes,
                },
                format!(
                    "'{}' runs {} minutes, above the {threshold}-minute delegation threshold",
                    item.title, item.planned_duration_minutes
                ),
            )
            .with_time_debt(item.planned_duration_minutes - threshold)
        })
        .collect();

    if let Some(cap) = ctx.budget.max_personal_creation_minutes {
        let creating: Vec<&WorkItem> = ctx
            .occupied
            .iter()
            .copied()
            .filter(|item| item.attention_type == AttentionType::Create)
            .collect();
        let mut total = sum_minutes(&creating);
        let mut largest = delegable.clone();
        largest.sort_by(|a, b| {
            b.planned_duration_minutes
                .cmp(&a.planned_duration_minutes)
                .then_with(|| a.id.cmp(&b.id))
        });
        for item in largest {
            if total <= u64::from(cap) {
                break;
            }
            total = total.saturating_sub(u64::from(item.planned_duration_minutes));
            out.push(
                OptimizationSuggestion::new(
                    SuggestionKind::Delegate,
                    Priority::High,
                    [item.id.clone()],
                    ProposedChange::Delegate {
                        item_id: item.id.clone(),
                        duration_minutes: item.planned_duration_minutes,
                    },
                    format!(
                        "Personal creation exceeds the {cap}-minute budget; hand off '{}'",
                        item.title
                    ),
                )
                .with_time_debt(item.planned_duration_minutes),
            );
        }
    }

    out
}

/// Non-negotiable items that something else overlaps.
pub(super) fn protect_conflicts(ctx: &DayContext<'_>) -> Vec<OptimizationSuggestion> {
    ctx.targetable()
        .filter(|item| item.non_negotiable)
        .filter_map(|protected| {
            let conflicts: Vec<&WorkItem> = ctx
                .occupied
                .iter()
                .copied()
                .filter(|other| other.id != protected.id && protected.overlaps(other))
                .collect();
            if conflicts.is_empty() {
                return None;
            }
            let overlap: i64 = conflicts
                .iter()
                .map(|other| {
                    let start = protected.start_time.max(other.start_time);
                    let end = protected.end_time().min(other.end_time());
                    minutes_between(start, end)
                })
                .sum();
            let mut conflicting_ids: Vec<String> =
                conflicts.iter().map(|other| other.id.clone()).collect();
            conflicting_ids.sort();

            Some(
                OptimizationSuggestion::new(
                    SuggestionKind::Protect,
                    Priority::High,
                    [protected.id.clone()],
                    ProposedChange::Protect {
                        item_id: protected.id.clone(),
                        conflicting_ids,
                    },
                    format!(
                        "'{}' is non-negotiable but overlaps {} other item(s)",
                        protected.title,
                        conflicts.len()
                    ),
                )
                .with_time_debt(clamp_minutes(overlap)),
            )
        })
        .collect()
}

/// Short same-type fragments sitting next to each other.
pub(super) fn merge_fragments(ctx: &DayContext<'_>) -> Vec<OptimizationSuggestion> {
    let min_useful = ctx.config.min_useful_block_minutes;
    let open: Vec<&WorkItem> = ctx.targetable().collect();

    open.windows(2)
        .filter_map(|pair| {
            let (first, second) = (pair[0], pair[1]);
            let gap = minutes_between(first.end_time(), second.start_time);
            let mergeable = first.attention_type == second.attention_type
                && first.planned_duration_minutes < min_useful
                && second.planned_duration_minutes < min_useful
                && (0..=ctx.config.merge_adjacency_minutes).contains(&gap);
            if !mergeable {
                return None;
            }
            let merged = first
                .planned_duration_minutes
                .saturating_add(second.planned_duration_minutes);
            let ids = vec![first.id.clone(), second.id.clone()];
            Some(
                OptimizationSuggestion::new(
                    SuggestionKind::Merge,
                    Priority::Low,
                    ids.clone(),
                    ProposedChange::Merge {
                        item_ids: ids,
                        merged_minutes: merged,
                    },
                    format!(
                        "Two {} fragments under {min_useful} minutes sit {gap} minutes apart; merge into one {merged}-minute block",
                        first.attention_type
                    ),
                )
                .with_time_debt(clamp_minutes(gap)),
            )
        })
        .collect()
}

/// Long blocks that collide with other kinds of work.
pub(super) fn split_long_blocks(ctx: &DayContext<'_>) -> Vec<OptimizationSuggestion> {
    let threshold = ctx.config.split_threshold_minutes;
    let chunk = ctx.budget.min_focus_block_minutes.max(1);

    ctx.targetable()
        .filter(|item| item.planned_duration_minutes > threshold)
        // Chunking is only meaningful within a single day
        .filter(|item| i64::from(item.planned_duration_minutes) <= MAX_DURATION_MINUTES)
        .filter(|item| {
            ctx.occupied.iter().any(|other| {
                other.id != item.id
                    && other.attention_type != item.attention_type
                    && item.overlaps(other)
            })
        })
        .map(|item| {
            let duration = item.planned_duration_minutes;
            let mut chunk_minutes = vec![chunk; (duration / chunk) as usize];
            if duration % chunk > 0 {
                chunk_minutes.push(duration % chunk);
            }
            OptimizationSuggestion::new(
                SuggestionKind::Split,
                Priority::Low,
                [item.id.clone()],
                ProposedChange::Split {
                    item_id: item.id.clone(),
                    chunk_minutes: chunk_minutes.clone(),
                },
                format!(
                    "'{}' runs {duration} minutes across other work; split into {} blocks of up to {chunk} minutes",
                    item.title,
                    chunk_minutes.len()
                ),
            )
            .with_time_debt(duration - threshold)
        })
        .collect()
}
