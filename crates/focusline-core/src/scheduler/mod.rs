//! Slot finder.
//!
//! Proposes where a new item of a given attention type and length fits into
//! an owner's day:
//! - Enumerates free gaps inside the workday window
//! - Places one candidate per gap that fits (at peak start for create/decide
//!   work when the peak window allows)
//! - Scores each candidate 0-100 and ranks them best first

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::attention::AttentionBudgetConfig;
use crate::error::ValidationError;
use crate::storage::WorkdayConfig;
use crate::timeline::{
    at_hour, validate_duration, AttentionType, ItemStatus, TimeGapDetector, TimelineSpan, WorkItem,
};

const BASE_SCORE: f64 = 50.0;
const PEAK_BONUS: f64 = 30.0;
const NEIGHBOUR_PENALTY: f64 = 20.0;
const NEIGHBOUR_HORIZON_MINUTES: f64 = 60.0;
const OVER_BUDGET_PENALTY: f64 = 25.0;

/// What to place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotQuery {
    pub attention_type: AttentionType,
    pub duration_minutes: i64,
    pub date: NaiveDate,
}

impl SlotQuery {
    pub fn new(attention_type: AttentionType, duration_minutes: i64, date: NaiveDate) -> Self {
        Self {
            attention_type,
            duration_minutes,
            date,
        }
    }
}

/// A ranked placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotCandidate {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub score: u8,
}

/// Finds free slots inside the configured workday.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotFinder {
    workday_start_hour: u8,
    workday_end_hour: u8,
}

impl SlotFinder {
    /// Finder for an 08:00-18:00 UTC workday.
    pub fn new() -> Self {
        Self::from_config(&WorkdayConfig::default())
    }

    pub fn from_config(config: &WorkdayConfig) -> Self {
        Self {
            workday_start_hour: config.start_hour,
            workday_end_hour: config.end_hour,
        }
    }

    pub fn with_workday(mut self, start_hour: u8, end_hour: u8) -> Self {
        self.workday_start_hour = start_hour;
        self.workday_end_hour = end_hour;
        self
    }

    /// Workday bounds on `date`.
    pub fn workday(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            at_hour(date, self.workday_start_hour),
            at_hour(date, self.workday_end_hour),
        )
    }

    /// Ranked candidates, best first. An empty list means the day is full.
    ///
    /// # Errors
    /// Returns an error if the duration is not positive or longer than a day.
    pub fn find(
        &self,
        query: &SlotQuery,
        items: &[WorkItem],
        budget: &AttentionBudgetConfig,
    ) -> Result<Vec<SlotCandidate>, ValidationError> {
        self.find_excluding(query, items, budget, &[])
    }

    /// Like [`find`](Self::find) but treats the items in `exclude` as absent,
    /// for moving existing items.
    pub fn find_excluding(
        &self,
        query: &SlotQuery,
        items: &[WorkItem],
        budget: &AttentionBudgetConfig,
        exclude: &[&str],
    ) -> Result<Vec<SlotCandidate>, ValidationError> {
        validate_duration(query.duration_minutes)?;

        let occupied: Vec<&WorkItem> = items
            .iter()
            .filter(|item| item.status != ItemStatus::Parked)
            .filter(|item| !exclude.contains(&item.id.as_str()))
            .collect();
        let spans: Vec<TimelineSpan> = occupied.iter().map(|item| TimelineSpan::from(*item)).collect();

        let (day_start, day_end) = self.workday(query.date);
        // Only gaps the new item fits into
        let gaps = TimeGapDetector::new()
            .with_min_gap(query.duration_minutes)
            .find_gaps(&spans, day_start, day_end);

        let length = Duration::minutes(query.duration_minutes);
        let peak_start = at_hour(query.date, budget.peak_hours_start);
        let peak_end = at_hour(query.date, budget.peak_hours_end);
        let high_load = query.attention_type.is_high_load();

        let same_type_minutes: i64 = occupied
            .iter()
            .filter(|item| item.attention_type == query.attention_type)
            .map(|item| item.planned_duration_minutes as i64)
            .sum();
        let over_budget = budget
            .budget_minutes(query.attention_type)
            .is_some_and(|limit| same_type_minutes + query.duration_minutes > limit as i64);

        let mut candidates: Vec<SlotCandidate> = gaps
            .iter()
            .map(|gap| {
                let peak_fits = peak_start >= gap.start_time
                    && peak_start + length <= gap.end_time
                    && peak_start + length <= peak_end;
                let start = if high_load && peak_fits {
                    peak_start
                } else {
                    gap.start_time
                };
                let end = start + length;

                let mut score = BASE_SCORE;
                if high_load && start >= peak_start && end <= peak_end {
                    score += PEAK_BONUS;
                }
                score -= neighbour_penalty(&occupied, query.attention_type, start, end);
                if over_budget {
                    score -= OVER_BUDGET_PENALTY;
                }

                SlotCandidate {
                    start_time: start,
                    end_time: end,
                    score: score.round().clamp(0.0, 100.0) as u8,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.start_time.cmp(&b.start_time))
        });
        Ok(candidates)
    }
}

impl Default for SlotFinder {
    fn default() -> Self {
        Self::new()
    }
}

/// Up to 20 points per item of another type ending or starting within the
/// horizon, scaled by proximity.
fn neighbour_penalty(
    occupied: &[&WorkItem],
    attention_type: AttentionType,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> f64 {
    occupied
        .iter()
        .filter(|item| item.attention_type != attention_type)
        .filter_map(|item| {
            let gap_minutes = if item.end_time() <= start {
                (start - item.end_time()).num_minutes()
            } else if item.start_time >= end {
                (item.start_time - end).num_minutes()
            } else {
                0
            };
            let distance = gap_minutes as f64;
            (distance < NEIGHBOUR_HORIZON_MINUTES)
                .then(|| NEIGHBOUR_PENALTY * (1.0 - distance / NEIGHBOUR_HORIZON_MINUTES))
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attention::{AttentionModel, Role, Zone};
    use crate::timeline::{NewItem, MAX_DURATION_MINUTES};
    use chrono::TimeZone;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn item(start: DateTime<Utc>, minutes: i64, kind: AttentionType) -> WorkItem {
        WorkItem::from_new(NewItem::new("ana", "x", start, minutes, kind, "main"), start).unwrap()
    }

    fn budget(role: Role) -> AttentionBudgetConfig {
        AttentionModel::new().resolve(role, Zone::Peacetime)
    }

    #[test]
    fn test_rejects_non_positive_duration() {
        let query = SlotQuery::new(AttentionType::Create, 0, date());
        let err = SlotFinder::new().find(&query, &[], &budget(Role::Maker)).unwrap_err();
        assert_eq!(err, ValidationError::NonPositiveDuration { minutes: 0 });
    }

    #[test]
    fn test_rejects_duration_beyond_a_day() {
        let finder = SlotFinder::new();
        for minutes in [MAX_DURATION_MINUTES + 1, i64::MAX] {
            let query = SlotQuery::new(AttentionType::Create, minutes, date());
            assert!(matches!(
                finder.find(&query, &[], &budget(Role::Maker)),
                Err(ValidationError::InvalidValue { .. })
            ));
        }
        // A full day is valid but cannot fit inside the workday
        let query = SlotQuery::new(AttentionType::Create, MAX_DURATION_MINUTES, date());
        assert!(finder.find(&query, &[], &budget(Role::Maker)).unwrap().is_empty());
    }

    #[test]
    fn test_empty_day_high_load_lands_on_peak() {
        let query = SlotQuery::new(AttentionType::Create, 90, date());
        let slots = SlotFinder::new().find(&query, &[], &budget(Role::Maker)).unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start_time, at(9, 0));
        assert_eq!(slots[0].score, 80);
    }

    #[test]
    fn test_low_load_starts_at_gap_start() {
        let query = SlotQuery::new(AttentionType::Consume, 30, date());
        let slots = SlotFinder::new().find(&query, &[], &budget(Role::Maker)).unwrap();
        assert_eq!(slots[0].start_time, at(8, 0));
        assert_eq!(slots[0].score, 50);
    }

    #[test]
    fn test_one_candidate_per_fitting_gap_ranked() {
        let items = vec![
            item(at(9, 0), 60, AttentionType::Connect),
            item(at(10, 30), 30, AttentionType::Connect),
            item(at(12, 0), 360, AttentionType::Administer),
        ];
        // Gaps: 08:00-09:00, 10:00-10:30 (too short), 11:00-12:00
        let query = SlotQuery::new(AttentionType::Connect, 45, date());
        let slots = SlotFinder::new().find(&query, &items, &budget(Role::Marker)).unwrap();

        assert_eq!(slots.len(), 2);
        // 08:00-08:45: no different-type neighbour within 60 min
        assert_eq!(slots[0].start_time, at(8, 0));
        assert_eq!(slots[0].score, 50);
        // 11:00-11:45: admin starts 15 min after, penalty 15
        assert_eq!(slots[1].start_time, at(11, 0));
        assert_eq!(slots[1].score, 35);
    }

    #[test]
    fn test_full_day_yields_nothing() {
        let items = vec![item(at(8, 0), 600, AttentionType::Connect)];
        let query = SlotQuery::new(AttentionType::Create, 30, date());
        let slots = SlotFinder::new().find(&query, &items, &budget(Role::Maker)).unwrap();
        assert!(slots.is_empty());
    }

    #[test]
    fn test_over_budget_penalty() {
        // Multiplier caps personal creation at 120 minutes
        let items = vec![item(at(14, 0), 100, AttentionType::Create)];
        let query = SlotQuery::new(AttentionType::Create, 30, date());
        let slots = SlotFinder::new()
            .find(&query, &items, &budget(Role::Multiplier))
            .unwrap();
        let peak = slots.iter().find(|s| s.start_time == at(9, 0)).unwrap();
        assert_eq!(peak.score, 55);
    }

    #[test]
    fn test_excluded_item_frees_its_time() {
        let blocker = item(at(8, 0), 600, AttentionType::Connect);
        let query = SlotQuery::new(AttentionType::Connect, 60, date());
        let slots = SlotFinder::new()
            .find_excluding(&query, &[blocker.clone()], &budget(Role::Maker), &[blocker.id.as_str()])
            .unwrap();
        assert_eq!(slots.len(), 1);
    }
}
