//! Role-fit scoring.
//!
//! Scores one owner's day against the resolved attention budget of a role.
//! Four sub-scores, each 0-100:
//!
//! | Axis | Measures |
//! |------|----------|
//! | time_allocation | share of minutes spent on the role's preferred types |
//! | attention_balance | distance of each type's minutes from an even split |
//! | context_switching | attention-type transitions per hour, linear decay |
//! | energy_alignment | share of create/decide items starting in peak hours |
//!
//! The overall score is their weighted average ([`ScoreWeights`]). Scoring is
//! pure: the same items and budget always produce the same result.

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::attention::{AttentionBudgetConfig, Role};
use crate::storage::{ScoreWeights, ScoringConfig};
use crate::timeline::{AttentionType, ItemStatus, WorkItem};

/// Score given to every axis of an empty day.
const NEUTRAL_SCORE: u8 = 50;

/// Sub-scores of a role-fit assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub time_allocation: u8,
    pub attention_balance: u8,
    pub context_switching: u8,
    pub energy_alignment: u8,
}

/// One sub-score axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreAxis {
    TimeAllocation,
    AttentionBalance,
    ContextSwitching,
    EnergyAlignment,
}

impl ScoreAxis {
    fn warning(self) -> &'static str {
        match self {
            Self::TimeAllocation => "Most of the day goes to work outside this role's focus",
            Self::AttentionBalance => "Attention is heavily skewed toward a single type of work",
            Self::ContextSwitching => "Frequent context switches are fragmenting the day",
            Self::EnergyAlignment => "Demanding work is scheduled outside peak hours",
        }
    }

    fn recommendation(self) -> &'static str {
        match self {
            Self::TimeAllocation => {
                "Shift time toward the attention types this role depends on; trim or hand off the rest"
            }
            Self::AttentionBalance => {
                "Spread the day across more kinds of work so no single type crowds out the others"
            }
            Self::ContextSwitching => {
                "Group items of the same attention type back to back to cut context switches"
            }
            Self::EnergyAlignment => "Move create and decide work into peak hours",
        }
    }
}

impl ScoreBreakdown {
    pub fn neutral() -> Self {
        Self {
            time_allocation: NEUTRAL_SCORE,
            attention_balance: NEUTRAL_SCORE,
            context_switching: NEUTRAL_SCORE,
            energy_alignment: NEUTRAL_SCORE,
        }
    }

    /// Axes in breakdown order.
    pub fn axes(&self) -> [(ScoreAxis, u8); 4] {
        [
            (ScoreAxis::TimeAllocation, self.time_allocation),
            (ScoreAxis::AttentionBalance, self.attention_balance),
            (ScoreAxis::ContextSwitching, self.context_switching),
            (ScoreAxis::EnergyAlignment, self.energy_alignment),
        ]
    }
}

/// Role-fit assessment of a day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleFitScore {
    pub overall: u8,
    pub breakdown: ScoreBreakdown,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
}

/// Stateless scorer; holds only thresholds and weights.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleFitScorer {
    weights: ScoreWeights,
    low_water_mark: u8,
    recommend_below: u8,
    max_transitions_per_hour: f64,
}

fn to_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

impl RoleFitScorer {
    pub fn new() -> Self {
        Self::from_config(&ScoringConfig::default())
    }

    pub fn from_config(config: &ScoringConfig) -> Self {
        Self {
            weights: config.weights,
            low_water_mark: config.low_water_mark,
            recommend_below: config.recommend_below,
            max_transitions_per_hour: config.max_transitions_per_hour,
        }
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Score a day. Parked items are ignored.
    pub fn score(&self, items: &[WorkItem], budget: &AttentionBudgetConfig) -> RoleFitScore {
        let mut day: Vec<&WorkItem> = items
            .iter()
            .filter(|item| item.status != ItemStatus::Parked)
            .collect();
        day.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));

        if day.is_empty() {
            return RoleFitScore {
                overall: NEUTRAL_SCORE,
                breakdown: ScoreBreakdown::neutral(),
                recommendations: vec![
                    "Nothing scheduled for this day; add work items to get a role-fit assessment"
                        .to_string(),
                ],
                warnings: Vec::new(),
            };
        }

        let breakdown = ScoreBreakdown {
            time_allocation: time_allocation(&day, budget),
            attention_balance: attention_balance(&day),
            context_switching: self.context_switching(&day),
            energy_alignment: energy_alignment(&day, budget),
        };

        RoleFitScore {
            overall: self.overall(&breakdown),
            breakdown,
            recommendations: self.recommendations(&breakdown, budget),
            warnings: self.warnings(&breakdown),
        }
    }

    fn overall(&self, breakdown: &ScoreBreakdown) -> u8 {
        let w = &self.weights;
        let total = w.sum();
        if total <= 0.0 {
            return NEUTRAL_SCORE;
        }
        let weighted = w.time_allocation * breakdown.time_allocation as f64
            + w.attention_balance * breakdown.attention_balance as f64
            + w.context_switching * breakdown.context_switching as f64
            + w.energy_alignment * breakdown.energy_alignment as f64;
        to_score(weighted / total)
    }

    fn context_switching(&self, day: &[&WorkItem]) -> u8 {
        let transitions = day
            .windows(2)
            .filter(|pair| pair[0].attention_type != pair[1].attention_type)
            .count();
        if transitions == 0 {
            return 100;
        }

        let first_start = day[0].start_time;
        let last_end = day
            .iter()
            .map(|item| item.end_time())
            .max()
            .unwrap_or(first_start);
        let span_hours = ((last_end - first_start).num_minutes() as f64 / 60.0).max(1.0);
        let rate = transitions as f64 / span_hours;
        to_score(100.0 * (1.0 - rate / self.max_transitions_per_hour).max(0.0))
    }

    fn warnings(&self, breakdown: &ScoreBreakdown) -> Vec<String> {
        breakdown
            .axes()
            .into_iter()
            .filter(|(_, score)| *score < self.low_water_mark)
            .map(|(axis, _)| axis.warning().to_string())
            .collect()
    }

    fn recommendations(
        &self,
        breakdown: &ScoreBreakdown,
        budget: &AttentionBudgetConfig,
    ) -> Vec<String> {
        let mut weak: Vec<(ScoreAxis, u8)> = breakdown
            .axes()
            .into_iter()
            .filter(|(_, score)| *score < self.recommend_below)
            .collect();
        // Stable sort keeps breakdown order among equal scores
        weak.sort_by_key(|(_, score)| *score);

        let mut out: Vec<String> = weak
            .into_iter()
            .map(|(axis, _)| axis.recommendation().to_string())
            .collect();
        out.push(role_recommendation(budget));
        out
    }
}

impl Default for RoleFitScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn total_minutes(day: &[&WorkItem]) -> f64 {
    day.iter()
        .map(|item| item.planned_duration_minutes as f64)
        .sum()
}

fn time_allocation(day: &[&WorkItem], budget: &AttentionBudgetConfig) -> u8 {
    let total = total_minutes(day);
    let preferred: f64 = day
        .iter()
        .filter(|item| budget.is_preferred(item.attention_type))
        .map(|item| item.planned_duration_minutes as f64)
        .sum();
    to_score(preferred / total * 100.0)
}

fn attention_balance(day: &[&WorkItem]) -> u8 {
    let total = total_minutes(day);
    let share = total / AttentionType::ALL.len() as f64;
    let per_type: f64 = AttentionType::ALL
        .iter()
        .map(|kind| {
            let actual: f64 = day
                .iter()
                .filter(|item| item.attention_type == *kind)
                .map(|item| item.planned_duration_minutes as f64)
                .sum();
            100.0 * (1.0 - (actual - share).abs() / share).max(0.0)
        })
        .sum();
    to_score(per_type / AttentionType::ALL.len() as f64)
}

fn energy_alignment(day: &[&WorkItem], budget: &AttentionBudgetConfig) -> u8 {
    let demanding: Vec<&&WorkItem> = day
        .iter()
        .filter(|item| item.attention_type.is_high_load())
        .collect();
    if demanding.is_empty() {
        return 100;
    }
    let in_peak = demanding
        .iter()
        .filter(|item| budget.in_peak_hour(item.start_time.hour()))
        .count();
    to_score(in_peak as f64 / demanding.len() as f64 * 100.0)
}

fn role_recommendation(budget: &AttentionBudgetConfig) -> String {
    match budget.role {
        Role::Maker => format!(
            "As a maker, keep at least one {}-minute focus block inside {:02}:00-{:02}:00 and cap meetings at {}",
            budget.min_focus_block_minutes,
            budget.peak_hours_start,
            budget.peak_hours_end,
            budget.max_meetings_per_day
        ),
        Role::Marker => format!(
            "As a marker, batch decisions into one window inside {:02}:00-{:02}:00 instead of deciding piecemeal",
            budget.peak_hours_start, budget.peak_hours_end
        ),
        Role::Multiplier => match budget.max_personal_creation_minutes {
            Some(cap) => format!(
                "As a multiplier, delegate create work longer than {} minutes and keep personal creation under {} minutes",
                budget.delegation_duration_threshold_minutes, cap
            ),
            None => format!(
                "As a multiplier, delegate create work longer than {} minutes",
                budget.delegation_duration_threshold_minutes
            ),
        },
    }
}
