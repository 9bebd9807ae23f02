//! Completion records and the sinks that receive them.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{data_dir, CompletionSink};
use crate::error::StoreError;
use crate::timeline::{AttentionType, WorkItem};

/// Planned-vs-actual record emitted once per completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub item_id: String,
    pub owner: String,
    pub title: String,
    pub attention_type: AttentionType,
    pub planned_minutes: u32,
    pub actual_minutes: i64,
    pub completed_at: DateTime<Utc>,
}

impl CompletionRecord {
    /// Build from a completed item; `actual_minutes` is `completed_at - start_time`.
    pub fn from_item(item: &WorkItem, completed_at: DateTime<Utc>) -> Self {
        Self {
            item_id: item.id.clone(),
            owner: item.owner.clone(),
            title: item.title.clone(),
            attention_type: item.attention_type,
            planned_minutes: item.planned_duration_minutes,
            actual_minutes: (completed_at - item.start_time).num_minutes(),
            completed_at,
        }
    }
}

/// Appends one JSON object per line to a file.
pub struct JsonlCompletionSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlCompletionSink {
    /// Sink writing to `<data_dir>/completions.jsonl`.
    pub fn open() -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self::at(dir.join("completions.jsonl")))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record back, oldest first.
    pub fn read_all(&self) -> Result<Vec<CompletionRecord>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Unavailable(e.to_string())),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| StoreError::Corrupt {
                    id: format!("{}:{}", self.path.display(), n + 1),
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl CompletionSink for JsonlCompletionSink {
    async fn record(&self, record: &CompletionRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record).map_err(|e| StoreError::Corrupt {
            id: record.item_id.clone(),
            message: e.to_string(),
        })?;
        line.push('\n');

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        file.write_all(line.as_bytes())
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct MemoryCompletionSink {
    records: Mutex<Vec<CompletionRecord>>,
    failing: Mutex<bool>,
}

impl MemoryCompletionSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<CompletionRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// While set, every delivery fails with a transient error.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(|e| e.into_inner()) = failing;
    }
}

#[async_trait]
impl CompletionSink for MemoryCompletionSink {
    async fn record(&self, record: &CompletionRecord) -> Result<(), StoreError> {
        if *self.failing.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(StoreError::Unavailable("completion sink offline".into()));
        }
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}
