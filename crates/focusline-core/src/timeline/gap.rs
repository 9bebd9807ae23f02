//! Free-time gap detection between occupied spans of a day.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::WorkItem;

/// A free window between occupied spans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeGap {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl TimeGap {
    /// Get duration in minutes
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

/// Occupied interval on the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineSpan {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl TimelineSpan {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time,
        }
    }
}

impl From<&WorkItem> for TimelineSpan {
    fn from(item: &WorkItem) -> Self {
        Self::new(item.start_time, item.end_time())
    }
}

/// Detector for finding gaps in a day
pub struct TimeGapDetector {
    /// Minimum gap duration to report (in minutes)
    min_gap_minutes: i64,
}

impl TimeGapDetector {
    /// Create a new detector that reports any non-empty gap
    pub fn new() -> Self {
        Self { min_gap_minutes: 1 }
    }

    /// Set the minimum gap duration
    pub fn with_min_gap(mut self, minutes: i64) -> Self {
        self.min_gap_minutes = minutes.max(1);
        self
    }

    /// Find gaps between spans inside `[day_start, day_end)`.
    ///
    /// Overlapping spans are coalesced. Gaps come back sorted by start time.
    pub fn find_gaps(
        &self,
        spans: &[TimelineSpan],
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Vec<TimeGap> {
        let mut gaps = Vec::new();
        if day_end <= day_start {
            return gaps;
        }

        let mut sorted: Vec<_> = spans.to_vec();
        sorted.sort_by_key(|s| (s.start_time, s.end_time));

        let mut last_end = day_start;

        for span in &sorted {
            // Entirely before the cursor
            if span.end_time <= last_end {
                continue;
            }
            if span.start_time >= day_end {
                break;
            }

            if span.start_time > last_end {
                self.push_gap(&mut gaps, last_end, span.start_time.min(day_end));
            }

            last_end = span.end_time.min(day_end);
        }

        if last_end < day_end {
            self.push_gap(&mut gaps, last_end, day_end);
        }

        gaps
    }

    fn push_gap(&self, gaps: &mut Vec<TimeGap>, start: DateTime<Utc>, end: DateTime<Utc>) {
        let gap = TimeGap {
            start_time: start,
            end_time: end,
        };
        if gap.duration_minutes() >= self.min_gap_minutes {
            gaps.push(gap);
        }
    }
}

impl Default for TimeGapDetector {
    fn default() -> Self {
        Self::new()
    }
}
