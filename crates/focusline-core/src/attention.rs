//! Attention model: roles, zones and per-role budgets.
//!
//! Each role has a Peacetime baseline. Wartime budgets are never configured
//! directly; they are derived from the baseline so the pair always stays
//! consistent:
//!
//! | Limit | Wartime |
//! |-------|---------|
//! | minute-valued limits | baseline × 0.8 (integer) |
//! | `max_meetings_per_day` | baseline ÷ 2, at least 1 |
//! | peak hours, preferred types | unchanged |

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::timeline::{AttentionType, MAX_DURATION_MINUTES};

/// Productivity archetype with distinct optimal scheduling patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Maker,
    Marker,
    Multiplier,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Maker, Role::Marker, Role::Multiplier];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maker => "maker",
            Self::Marker => "marker",
            Self::Multiplier => "multiplier",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maker" => Ok(Self::Maker),
            "marker" => Ok(Self::Marker),
            "multiplier" => Ok(Self::Multiplier),
            other => Err(ValidationError::InvalidValue {
                field: "role".into(),
                message: format!("unknown role '{other}'"),
            }),
        }
    }
}

/// Operating posture that tightens or relaxes role budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Wartime,
    Peacetime,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wartime => "wartime",
            Self::Peacetime => "peacetime",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wartime" => Ok(Self::Wartime),
            "peacetime" => Ok(Self::Peacetime),
            other => Err(ValidationError::InvalidValue {
                field: "zone".into(),
                message: format!("unknown zone '{other}'"),
            }),
        }
    }
}

/// Resolved budget for one (role, zone) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttentionBudgetConfig {
    pub role: Role,
    pub zone: Zone,
    pub min_focus_block_minutes: u32,
    pub max_meetings_per_day: u32,
    /// Hour of day (UTC) at which peak hours begin
    pub peak_hours_start: u8,
    /// Hour of day (UTC) at which peak hours end, exclusive
    pub peak_hours_end: u8,
    /// Ordered set, most preferred first
    pub preferred_attention_types: Vec<AttentionType>,
    /// Multiplier only
    pub max_personal_creation_minutes: Option<u32>,
    pub delegation_duration_threshold_minutes: u32,
    /// Daily budget for administer work
    pub max_admin_minutes: u32,
}

impl AttentionBudgetConfig {
    /// Built-in Peacetime baseline for a role.
    pub fn peacetime_default(role: Role) -> Self {
        match role {
            Role::Maker => Self {
                role,
                zone: Zone::Peacetime,
                min_focus_block_minutes: 90,
                max_meetings_per_day: 3,
                peak_hours_start: 9,
                peak_hours_end: 12,
                preferred_attention_types: vec![AttentionType::Create, AttentionType::Decide],
                max_personal_creation_minutes: None,
                delegation_duration_threshold_minutes: 240,
                max_admin_minutes: 60,
            },
            Role::Marker => Self {
                role,
                zone: Zone::Peacetime,
                min_focus_block_minutes: 60,
                max_meetings_per_day: 5,
                peak_hours_start: 10,
                peak_hours_end: 13,
                preferred_attention_types: vec![AttentionType::Decide, AttentionType::Connect],
                max_personal_creation_minutes: None,
                delegation_duration_threshold_minutes: 120,
                max_admin_minutes: 90,
            },
            Role::Multiplier => Self {
                role,
                zone: Zone::Peacetime,
                min_focus_block_minutes: 45,
                max_meetings_per_day: 8,
                peak_hours_start: 9,
                peak_hours_end: 11,
                preferred_attention_types: vec![AttentionType::Connect, AttentionType::Decide],
                max_personal_creation_minutes: Some(120),
                delegation_duration_threshold_minutes: 60,
                max_admin_minutes: 120,
            },
        }
    }

    /// Derive the Wartime budget from a Peacetime baseline.
    pub fn to_wartime(&self) -> Self {
        // Never larger than the input, so the narrowing cannot fail
        let tighten =
            |minutes: u32| u32::try_from(u64::from(minutes) * 4 / 5).unwrap_or(minutes);
        Self {
            role: self.role,
            zone: Zone::Wartime,
            min_focus_block_minutes: tighten(self.min_focus_block_minutes).max(1),
            max_meetings_per_day: (self.max_meetings_per_day / 2).max(1),
            peak_hours_start: self.peak_hours_start,
            peak_hours_end: self.peak_hours_end,
            preferred_attention_types: self.preferred_attention_types.clone(),
            max_personal_creation_minutes: self.max_personal_creation_minutes.map(tighten),
            delegation_duration_threshold_minutes: tighten(
                self.delegation_duration_threshold_minutes,
            ),
            max_admin_minutes: tighten(self.max_admin_minutes),
        }
    }

    /// Daily minute budget for an attention type, if the role caps it.
    pub fn budget_minutes(&self, attention_type: AttentionType) -> Option<u32> {
        match attention_type {
            AttentionType::Create => self.max_personal_creation_minutes,
            AttentionType::Administer => Some(self.max_admin_minutes),
            _ => None,
        }
    }

    pub fn is_preferred(&self, attention_type: AttentionType) -> bool {
        self.preferred_attention_types.contains(&attention_type)
    }

    /// Whether `hour` (0-23) is inside `[peak_hours_start, peak_hours_end)`.
    pub fn in_peak_hour(&self, hour: u32) -> bool {
        hour >= self.peak_hours_start as u32 && hour < self.peak_hours_end as u32
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.peak_hours_start >= self.peak_hours_end || self.peak_hours_end > 24 {
            return Err(ValidationError::InvalidValue {
                field: format!("roles.{}.peak_hours", self.role),
                message: format!(
                    "peak hours {}..{} must satisfy start < end <= 24",
                    self.peak_hours_start, self.peak_hours_end
                ),
            });
        }
        if self.min_focus_block_minutes == 0 {
            return Err(ValidationError::InvalidValue {
                field: format!("roles.{}.min_focus_block_minutes", self.role),
                message: "must be positive".into(),
            });
        }
        let limits = [
            ("min_focus_block_minutes", Some(self.min_focus_block_minutes)),
            ("max_personal_creation_minutes", self.max_personal_creation_minutes),
            (
                "delegation_duration_threshold_minutes",
                Some(self.delegation_duration_threshold_minutes),
            ),
            ("max_admin_minutes", Some(self.max_admin_minutes)),
        ];
        for (name, minutes) in limits {
            if minutes.is_some_and(|m| i64::from(m) > MAX_DURATION_MINUTES) {
                return Err(ValidationError::InvalidValue {
                    field: format!("roles.{}.{name}", self.role),
                    message: format!("must not exceed {MAX_DURATION_MINUTES} minutes"),
                });
            }
        }
        if self.preferred_attention_types.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: format!("roles.{}.preferred_attention_types", self.role),
                message: "at least one preferred type is required".into(),
            });
        }
        Ok(())
    }
}

/// Partial Peacetime baseline from the `[roles.<role>]` config section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaselineOverride {
    pub min_focus_block_minutes: Option<u32>,
    pub max_meetings_per_day: Option<u32>,
    pub peak_hours_start: Option<u8>,
    pub peak_hours_end: Option<u8>,
    pub preferred_attention_types: Option<Vec<AttentionType>>,
    pub max_personal_creation_minutes: Option<u32>,
    pub delegation_duration_threshold_minutes: Option<u32>,
    pub max_admin_minutes: Option<u32>,
}

impl BaselineOverride {
    fn apply(&self, base: &mut AttentionBudgetConfig) {
        if let Some(v) = self.min_focus_block_minutes {
            base.min_focus_block_minutes = v;
        }
        if let Some(v) = self.max_meetings_per_day {
            base.max_meetings_per_day = v;
        }
        if let Some(v) = self.peak_hours_start {
            base.peak_hours_start = v;
        }
        if let Some(v) = self.peak_hours_end {
            base.peak_hours_end = v;
        }
        if let Some(v) = &self.preferred_attention_types {
            let mut ordered = Vec::with_capacity(v.len());
            for t in v {
                if !ordered.contains(t) {
                    ordered.push(*t);
                }
            }
            base.preferred_attention_types = ordered;
        }
        if let Some(v) = self.max_personal_creation_minutes {
            // Personal creation caps only exist for Multipliers
            if base.role == Role::Multiplier {
                base.max_personal_creation_minutes = Some(v);
            }
        }
        if let Some(v) = self.delegation_duration_threshold_minutes {
            base.delegation_duration_threshold_minutes = v;
        }
        if let Some(v) = self.max_admin_minutes {
            base.max_admin_minutes = v;
        }
    }
}

/// Static role/zone configuration, loaded once per request.
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionModel {
    baselines: BTreeMap<Role, AttentionBudgetConfig>,
}

impl AttentionModel {
    /// Model with built-in baselines.
    pub fn new() -> Self {
        let baselines = Role::ALL
            .iter()
            .map(|role| (*role, AttentionBudgetConfig::peacetime_default(*role)))
            .collect();
        Self { baselines }
    }

    /// Model with per-role overrides applied over the built-in baselines.
    pub fn with_overrides(
        overrides: &BTreeMap<Role, BaselineOverride>,
    ) -> Result<Self, ValidationError> {
        let mut model = Self::new();
        for (role, patch) in overrides {
            if let Some(base) = model.baselines.get_mut(role) {
                patch.apply(base);
                base.validate()?;
            }
        }
        Ok(model)
    }

    /// Exactly one budget resolves for every (role, zone) pair.
    pub fn resolve(&self, role: Role, zone: Zone) -> AttentionBudgetConfig {
        let baseline = self
            .baselines
            .get(&role)
            .cloned()
            .unwrap_or_else(|| AttentionBudgetConfig::peacetime_default(role));
        match zone {
            Zone::Peacetime => baseline,
            Zone::Wartime => baseline.to_wartime(),
        }
    }
}

impl Default for AttentionModel {
    fn default() -> Self {
        Self::new()
    }
}
