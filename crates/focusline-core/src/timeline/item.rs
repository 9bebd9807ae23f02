//! Work item types and utilities.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Categorical tag driving allocation and context-switch scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionType {
    Create,
    Decide,
    Connect,
    Administer,
    Consume,
}

impl AttentionType {
    /// Every attention type, in declaration order.
    pub const ALL: [AttentionType; 5] = [
        AttentionType::Create,
        AttentionType::Decide,
        AttentionType::Connect,
        AttentionType::Administer,
        AttentionType::Consume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Decide => "decide",
            Self::Connect => "connect",
            Self::Administer => "administer",
            Self::Consume => "consume",
        }
    }

    /// Create and decide work needs peak cognitive capacity.
    pub fn is_high_load(&self) -> bool {
        matches!(self, Self::Create | Self::Decide)
    }
}

impl fmt::Display for AttentionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttentionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(Self::Create),
            "decide" => Ok(Self::Decide),
            "connect" => Ok(Self::Connect),
            "administer" | "admin" => Ok(Self::Administer),
            "consume" => Ok(Self::Consume),
            other => Err(ValidationError::InvalidValue {
                field: "attention_type".into(),
                message: format!("unknown attention type '{other}'"),
            }),
        }
    }
}

/// Lifecycle status of a work item.
///
/// ```text
///   Active ──overdue ≥ 1h──> Logjam ──overdue ≥ 8h──> Parked
///     │                        │                        │
///     └──complete──> Completed <──complete──┘      unpark
///                                                       │
///   Active <────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Active,
    Logjam,
    Parked,
    Completed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Logjam => "logjam",
            Self::Parked => "parked",
            Self::Completed => "completed",
        }
    }

    /// Items the sweep may relocate and users may complete.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Active | Self::Logjam)
    }

    /// Check if a transition is valid.
    pub fn can_transition_to(&self, to: &ItemStatus) -> bool {
        match self {
            Self::Active => matches!(to, Self::Active | Self::Logjam | Self::Parked | Self::Completed),
            Self::Logjam => matches!(to, Self::Active | Self::Logjam | Self::Parked | Self::Completed),
            Self::Parked => matches!(to, Self::Active | Self::Logjam),
            Self::Completed => false,
        }
    }
}

impl FromStr for ItemStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "logjam" => Ok(Self::Logjam),
            "parked" => Ok(Self::Parked),
            "completed" => Ok(Self::Completed),
            other => Err(ValidationError::InvalidValue {
                field: "status".into(),
                message: format!("unknown status '{other}'"),
            }),
        }
    }
}

/// A time-boxed unit of work on an owner's timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub planned_duration_minutes: u32,
    pub attention_type: AttentionType,
    /// Lane grouping used for visibility filtering
    pub layer_id: String,
    #[serde(default)]
    pub is_meeting: bool,
    pub status: ItemStatus,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub non_negotiable: bool,
    /// Bumped on every committed write; compare-and-swap token
    #[serde(default)]
    pub version: u64,
    pub parked_at: Option<DateTime<Utc>>,
    pub unparked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkItem {
    /// Build a new Active item from validated input.
    pub fn from_new(new: NewItem, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        new.validate()?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner: new.owner,
            title: new.title.trim().to_string(),
            start_time: new.start_time,
            planned_duration_minutes: new.duration_minutes as u32,
            attention_type: new.attention_type,
            layer_id: new.layer_id,
            is_meeting: new.is_meeting,
            status: ItemStatus::Active,
            completed_at: None,
            non_negotiable: new.non_negotiable,
            version: 0,
            parked_at: None,
            unparked_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Planned end of the item.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(self.planned_duration_minutes as i64)
    }

    /// Minutes past the planned end at `now` (negative while still running or upcoming).
    pub fn overdue_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.end_time()).num_minutes()
    }

    /// Check if this item overlaps with another
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start_time < other.end_time() && self.end_time() > other.start_time
    }

    /// Whether the item occupies any part of `[start, end)`.
    pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && self.end_time() > start
    }

    /// Record a committed write.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

/// Input for creating an item (manual entry or an external sync producer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub owner: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i64,
    pub attention_type: AttentionType,
    pub layer_id: String,
    #[serde(default)]
    pub is_meeting: bool,
    #[serde(default)]
    pub non_negotiable: bool,
}

impl NewItem {
    pub fn new(
        owner: impl Into<String>,
        title: impl Into<String>,
        start_time: DateTime<Utc>,
        duration_minutes: i64,
        attention_type: AttentionType,
        layer_id: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            title: title.into(),
            start_time,
            duration_minutes,
            attention_type,
            layer_id: layer_id.into(),
            is_meeting: false,
            non_negotiable: false,
        }
    }

    /// Mark as meeting
    pub fn meeting(mut self) -> Self {
        self.is_meeting = true;
        self
    }

    /// Mark as non-negotiable
    pub fn protected(mut self) -> Self {
        self.non_negotiable = true;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.owner.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "owner" });
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "title" });
        }
        validate_duration(self.duration_minutes)?;
        Ok(())
    }
}

/// Partial update applied by `update_item` / `reschedule_item`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub planned_duration_minutes: Option<i64>,
    pub attention_type: Option<AttentionType>,
    pub layer_id: Option<String>,
    pub is_meeting: Option<bool>,
    pub non_negotiable: Option<bool>,
}

impl ItemPatch {
    /// Patch that only moves the start time.
    pub fn reschedule(new_start: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(new_start),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(ValidationError::EmptyField { field: "title" });
            }
        }
        if let Some(minutes) = self.planned_duration_minutes {
            validate_duration(minutes)?;
        }
        Ok(())
    }

    /// Apply to an item. Callers validate first.
    pub(crate) fn apply_to(&self, item: &mut WorkItem) {
        if let Some(title) = &self.title {
            item.title = title.trim().to_string();
        }
        if let Some(start) = self.start_time {
            item.start_time = start;
        }
        if let Some(minutes) = self.planned_duration_minutes {
            item.planned_duration_minutes = minutes as u32;
        }
        if let Some(attention_type) = self.attention_type {
            item.attention_type = attention_type;
        }
        if let Some(layer_id) = &self.layer_id {
            item.layer_id = layer_id.clone();
        }
        if let Some(is_meeting) = self.is_meeting {
            item.is_meeting = is_meeting;
        }
        if let Some(non_negotiable) = self.non_negotiable {
            item.non_negotiable = non_negotiable;
        }
    }
}

/// Longest plannable item or slot: one day.
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// Durations must lie in `1..=MAX_DURATION_MINUTES`.
pub(crate) fn validate_duration(minutes: i64) -> Result<(), ValidationError> {
    if minutes <= 0 {
        return Err(ValidationError::NonPositiveDuration { minutes });
    }
    if minutes > MAX_DURATION_MINUTES {
        return Err(ValidationError::InvalidValue {
            field: "duration_minutes".into(),
            message: format!("{minutes} exceeds {MAX_DURATION_MINUTES} minutes"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn item(start: DateTime<Utc>, minutes: i64) -> WorkItem {
        let new = NewItem::new("ana", "Write draft", start, minutes, AttentionType::Create, "work");
        WorkItem::from_new(new, start).unwrap()
    }

    #[test]
    fn test_new_item_is_active() {
        let item = item(at(9, 0), 60);
        assert_eq!(item.status, ItemStatus::Active);
        assert!(item.completed_at.is_none());
        assert_eq!(item.end_time(), at(10, 0));
        assert_eq!(item.version, 0);
    }

    #[test]
    fn test_rejects_non_positive_duration() {
        let new = NewItem::new("ana", "Nothing", at(9, 0), 0, AttentionType::Create, "work");
        assert_eq!(
            WorkItem::from_new(new, at(9, 0)).unwrap_err(),
            ValidationError::NonPositiveDuration { minutes: 0 }
        );
    }

    #[test]
    fn test_rejects_duration_longer_than_a_day() {
        let new = NewItem::new("ana", "Forever", at(9, 0), 3_000_000_000, AttentionType::Create, "work");
        assert!(matches!(
            WorkItem::from_new(new, at(9, 0)),
            Err(ValidationError::InvalidValue { .. })
        ));
        let new = NewItem::new("ana", "Full day", at(0, 0), MAX_DURATION_MINUTES, AttentionType::Create, "work");
        assert!(WorkItem::from_new(new, at(0, 0)).is_ok());

        let patch = ItemPatch {
            planned_duration_minutes: Some(MAX_DURATION_MINUTES + 1),
            ..ItemPatch::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_rejects_blank_title() {
        let new = NewItem::new("ana", "   ", at(9, 0), 30, AttentionType::Create, "work");
        assert!(matches!(
            WorkItem::from_new(new, at(9, 0)),
            Err(ValidationError::EmptyField { field: "title" })
        ));
    }

    #[test]
    fn test_overdue_minutes() {
        let item = item(at(9, 0), 60);
        assert_eq!(item.overdue_minutes(at(9, 30)), -30);
        assert_eq!(item.overdue_minutes(at(11, 0)), 60);
    }

    #[test]
    fn test_overlap() {
        let a = item(at(9, 0), 60);
        let b = item(at(9, 30), 60);
        let c = item(at(10, 0), 30);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_status_transitions() {
        assert!(ItemStatus::Active.can_transition_to(&ItemStatus::Completed));
        assert!(ItemStatus::Logjam.can_transition_to(&ItemStatus::Parked));
        assert!(!ItemStatus::Parked.can_transition_to(&ItemStatus::Completed));
        assert!(!ItemStatus::Completed.can_transition_to(&ItemStatus::Active));
    }

    #[test]
    fn test_patch_apply() {
        let mut item = item(at(9, 0), 60);
        let patch = ItemPatch {
            title: Some(" Edit draft ".into()),
            planned_duration_minutes: Some(45),
            ..ItemPatch::reschedule(at(14, 0))
        };
        patch.validate().unwrap();
        patch.apply_to(&mut item);
        assert_eq!(item.title, "Edit draft");
        assert_eq!(item.start_time, at(14, 0));
        assert_eq!(item.planned_duration_minutes, 45);
    }

    #[test]
    fn test_attention_type_parse() {
        assert_eq!("Decide".parse::<AttentionType>().unwrap(), AttentionType::Decide);
        assert_eq!("admin".parse::<AttentionType>().unwrap(), AttentionType::Administer);
        assert!("dream".parse::<AttentionType>().is_err());
    }
}
