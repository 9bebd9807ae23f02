//! Timeline data model.
//!
//! This module provides:
//! - Work items with their lifecycle status and attention type
//! - Create/patch inputs validated before any store write
//! - Free-time gap detection used by the slot finder

mod gap;
mod item;

pub use gap::{TimeGap, TimeGapDetector, TimelineSpan};
pub use item::{AttentionType, ItemPatch, ItemStatus, NewItem, WorkItem, MAX_DURATION_MINUTES};
pub(crate) use item::validate_duration;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// UTC bounds `[00:00, next 00:00)` of a calendar day.
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    (start, start + Duration::days(1))
}

/// UTC instant `hour:00` on `date`; `hour` 24 means the following midnight.
pub fn at_hour(date: NaiveDate, hour: u8) -> DateTime<Utc> {
    day_bounds(date).0 + Duration::hours(hour.min(24) as i64)
}
