//! Optimization suggestion engine.
//!
//! Turns one owner's day into an ordered list of concrete changes:
//! - Maker: protect a focus block, shed excess meetings
//! - Marker: batch scattered decisions
//! - Multiplier: delegate large or excess create work
//! - Everyone: protect non-negotiable items, merge fragments, split long
//!   blocks that collide with other work
//!
//! Output is deterministic: highest priority first, then most time debt,
//! then a fixed kind rank, then target ids. Each item is targeted by at most
//! one suggestion.

mod rules;

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::attention::AttentionBudgetConfig;
use crate::scheduler::{SlotCandidate, SlotFinder};
use crate::storage::SuggestConfig;
use crate::timeline::{AttentionType, ItemStatus, WorkItem};

/// Kind of change proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Schedule,
    Batch,
    Delegate,
    Reschedule,
    Protect,
    Split,
    Merge,
}

impl SuggestionKind {
    /// Tie-break rank; lower sorts first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Protect => 0,
            Self::Schedule => 1,
            Self::Reschedule => 2,
            Self::Delegate => 3,
            Self::Batch => 4,
            Self::Split => 5,
            Self::Merge => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schedule => "schedule",
            Self::Batch => "batch",
            Self::Delegate => "delegate",
            Self::Reschedule => "reschedule",
            Self::Protect => "protect",
            Self::Split => "split",
            Self::Merge => "merge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// Kind-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProposedChange {
    Schedule {
        attention_type: AttentionType,
        duration_minutes: u32,
        /// Best slot today, if any is free
        slot: Option<SlotCandidate>,
    },
    Reschedule {
        item_id: String,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    Batch {
        item_ids: Vec<String>,
        total_minutes: u32,
        slot: Option<SlotCandidate>,
    },
    Delegate {
        item_id: String,
        duration_minutes: u32,
    },
    Protect {
        item_id: String,
        conflicting_ids: Vec<String>,
    },
    Merge {
        item_ids: Vec<String>,
        merged_minutes: u32,
    },
    Split {
        item_id: String,
        chunk_minutes: Vec<u32>,
    },
}

/// One proposed change to the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSuggestion {
    pub kind: SuggestionKind,
    /// Sorted, without duplicates
    pub target_item_ids: Vec<String>,
    pub priority: Priority,
    pub proposed_change: ProposedChange,
    pub rationale: String,
    /// Minutes of misallocation this change resolves
    pub time_debt_minutes: u32,
}

impl OptimizationSuggestion {
    pub fn new(
        kind: SuggestionKind,
        priority: Priority,
        targets: impl IntoIterator<Item = String>,
        proposed_change: ProposedChange,
        rationale: impl Into<String>,
    ) -> Self {
        let mut target_item_ids: Vec<String> = targets.into_iter().collect();
        target_item_ids.sort();
        target_item_ids.dedup();
        Self {
            kind,
            target_item_ids,
            priority,
            proposed_change,
            rationale: rationale.into(),
            time_debt_minutes: 0,
        }
    }

    pub fn with_time_debt(mut self, minutes: u32) -> Self {
        self.time_debt_minutes = minutes;
        self
    }

    fn order(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.time_debt_minutes.cmp(&self.time_debt_minutes))
            .then_with(|| self.kind.rank().cmp(&other.kind.rank()))
            .then_with(|| self.target_item_ids.cmp(&other.target_item_ids))
    }
}

/// Input shared by every rule.
pub(crate) struct DayContext<'a> {
    pub date: NaiveDate,
    /// Every non-parked item of the day, sorted by start then id
    pub occupied: Vec<&'a WorkItem>,
    pub budget: &'a AttentionBudgetConfig,
    pub config: &'a SuggestConfig,
    pub slots: &'a SlotFinder,
}

impl<'a> DayContext<'a> {
    /// Items a suggestion may target: open (Active/Logjam) only.
    pub fn targetable(&self) -> impl Iterator<Item = &'a WorkItem> + '_ {
        self.occupied.iter().copied().filter(|item| item.status.is_open())
    }

    pub fn day_items(&self) -> Vec<WorkItem> {
        self.occupied.iter().map(|item| (*item).clone()).collect()
    }
}

/// Generates and ranks suggestions for a day.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionEngine {
    config: SuggestConfig,
    slots: SlotFinder,
}

impl SuggestionEngine {
    pub fn new() -> Self {
        Self::from_config(SuggestConfig::default(), SlotFinder::new())
    }

    pub fn from_config(config: SuggestConfig, slots: SlotFinder) -> Self {
        Self { config, slots }
    }

    /// Suggestions for `date`, best first.
    pub fn suggest(
        &self,
        date: NaiveDate,
        items: &[WorkItem],
        budget: &AttentionBudgetConfig,
    ) -> Vec<OptimizationSuggestion> {
        let mut occupied: Vec<&WorkItem> = items
            .iter()
            .filter(|item| item.status != ItemStatus::Parked)
            .collect();
        occupied.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));

        let ctx = DayContext {
            date,
            occupied,
            budget,
            config: &self.config,
            slots: &self.slots,
        };

        let mut raw = Vec::new();
        raw.extend(rules::focus_block(&ctx));
        raw.extend(rules::excess_meetings(&ctx));
        raw.extend(rules::batch_decisions(&ctx));
        raw.extend(rules::delegate_creation(&ctx));
        raw.extend(rules::protect_conflicts(&ctx));
        raw.extend(rules::merge_fragments(&ctx));
        raw.extend(rules::split_long_blocks(&ctx));

        rank(raw, &ctx)
    }
}

impl Default for SuggestionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Sort, drop anything aimed at a non-negotiable item that would move or
/// hand it off, then keep one suggestion per target.
fn rank(mut raw: Vec<OptimizationSuggestion>, ctx: &DayContext<'_>) -> Vec<OptimizationSuggestion> {
    let protected: HashSet<&str> = ctx
        .occupied
        .iter()
        .filter(|item| item.non_negotiable)
        .map(|item| item.id.as_str())
        .collect();
    raw.retain(|s| {
        !matches!(s.kind, SuggestionKind::Reschedule | SuggestionKind::Delegate)
            || !s.target_item_ids.iter().any(|id| protected.contains(id.as_str()))
    });

    raw.sort_by(|a, b| a.order(b));

    let mut seen: HashSet<(SuggestionKind, Vec<String>)> = HashSet::new();
    let mut claimed: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());
    for suggestion in raw {
        if !seen.insert((suggestion.kind, suggestion.target_item_ids.clone())) {
            continue;
        }
        if suggestion
            .target_item_ids
            .iter()
            .any(|id| claimed.contains(id))
        {
            continue;
        }
        claimed.extend(suggestion.target_item_ids.iter().cloned());
        out.push(suggestion);
    }
    out
}
