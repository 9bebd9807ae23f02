//! Store and sink seams consumed by the lifecycle manager.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CompletionRecord;
use crate::error::StoreError;
use crate::timeline::WorkItem;

/// Which partition an item currently lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Live,
    Parked,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Parked => "parked",
        }
    }
}

/// Partitioned work-item store.
///
/// Live holds Active, Logjam and Completed items; parked holds Parked items.
/// Inserts are keyed by id (a second insert of the same id overwrites), so
/// every write is safe to replay.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn get_live(&self, id: &str) -> Result<Option<WorkItem>, StoreError>;

    async fn get_parked(&self, id: &str) -> Result<Option<WorkItem>, StoreError>;

    /// Insert or overwrite a live item.
    async fn upsert_live(&self, item: &WorkItem) -> Result<(), StoreError>;

    /// Compare-and-swap: overwrite the live copy only if its stored version
    /// equals `expected_version`. Returns whether the write happened.
    async fn update_live_if(
        &self,
        item: &WorkItem,
        expected_version: u64,
    ) -> Result<bool, StoreError>;

    /// Insert or overwrite a parked item.
    async fn upsert_parked(&self, item: &WorkItem) -> Result<(), StoreError>;

    /// Returns whether a row was removed.
    async fn delete_live(&self, id: &str) -> Result<bool, StoreError>;

    /// Returns whether a row was removed.
    async fn delete_parked(&self, id: &str) -> Result<bool, StoreError>;

    /// Live items of `owner`, optionally restricted to those starting in
    /// `[from, to)`, ordered by start time then id.
    async fn list_live(
        &self,
        owner: &str,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<WorkItem>, StoreError>;

    /// Parked items of `owner`, ordered by start time then id.
    async fn list_parked(&self, owner: &str) -> Result<Vec<WorkItem>, StoreError>;

    /// Every owner with at least one item in either partition, sorted.
    async fn owners(&self) -> Result<Vec<String>, StoreError>;
}

/// Consumer of completion records.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn record(&self, record: &CompletionRecord) -> Result<(), StoreError>;
}
