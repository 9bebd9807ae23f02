//! In-process item store.
//!
//! Backs tests and embedding callers that do not need durability. Failures
//! can be injected per operation to exercise retry and reconciliation paths.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::ItemStore;
use crate::error::StoreError;
use crate::timeline::WorkItem;

/// Store operation, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetLive,
    GetParked,
    UpsertLive,
    UpdateLive,
    UpsertParked,
    DeleteLive,
    DeleteParked,
    List,
}

#[derive(Debug, Default)]
struct Inner {
    live: BTreeMap<String, WorkItem>,
    parked: BTreeMap<String, WorkItem>,
    faults: HashMap<StoreOp, u32>,
}

impl Inner {
    fn check(&mut self, op: StoreOp) -> Result<(), StoreError> {
        match self.faults.get_mut(&op) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(StoreError::Unavailable(format!("injected failure on {op:?}")))
            }
            _ => Ok(()),
        }
    }
}

/// Item store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    inner: Mutex<Inner>,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls of `op` fail with a transient error.
    pub fn fail_next(&self, op: StoreOp, times: u32) {
        self.lock().faults.insert(op, times);
    }

    /// Number of items in each partition, `(live, parked)`.
    pub fn counts(&self) -> (usize, usize) {
        let inner = self.lock();
        (inner.live.len(), inner.parked.len())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn sorted(mut items: Vec<WorkItem>) -> Vec<WorkItem> {
    items.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
    items
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn get_live(&self, id: &str) -> Result<Option<WorkItem>, StoreError> {
        let mut inner = self.lock();
        inner.check(StoreOp::GetLive)?;
        Ok(inner.live.get(id).cloned())
    }

    async fn get_parked(&self, id: &str) -> Result<Option<WorkItem>, StoreError> {
        let mut inner = self.lock();
        inner.check(StoreOp::GetParked)?;
        Ok(inner.parked.get(id).cloned())
    }

    async fn upsert_live(&self, item: &WorkItem) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check(StoreOp::UpsertLive)?;
        inner.live.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn update_live_if(
        &self,
        item: &WorkItem,
        expected_version: u64,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        inner.check(StoreOp::UpdateLive)?;
        match inner.live.get_mut(&item.id) {
            Some(current) if current.version == expected_version => {
                *current = item.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn upsert_parked(&self, item: &WorkItem) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check(StoreOp::UpsertParked)?;
        inner.parked.insert(item.id.clone(), item.clone());
        Ok(())
    }

    async fn delete_live(&self, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        inner.check(StoreOp::DeleteLive)?;
        Ok(inner.live.remove(id).is_some())
    }

    async fn delete_parked(&self, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        inner.check(StoreOp::DeleteParked)?;
        Ok(inner.parked.remove(id).is_some())
    }

    async fn list_live(
        &self,
        owner: &str,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<WorkItem>, StoreError> {
        let mut inner = self.lock();
        inner.check(StoreOp::List)?;
        let items = inner
            .live
            .values()
            .filter(|item| item.owner == owner)
            .filter(|item| match range {
                Some((from, to)) => item.start_time >= from && item.start_time < to,
                None => true,
            })
            .cloned()
            .collect();
        Ok(sorted(items))
    }

    async fn list_parked(&self, owner: &str) -> Result<Vec<WorkItem>, StoreError> {
        let mut inner = self.lock();
        inner.check(StoreOp::List)?;
        let items = inner
            .parked
            .values()
            .filter(|item| item.owner == owner)
            .cloned()
            .collect();
        Ok(sorted(items))
    }

    async fn owners(&self) -> Result<Vec<String>, StoreError> {
        let mut inner = self.lock();
        inner.check(StoreOp::List)?;
        let owners: BTreeSet<String> = inner
            .live
            .values()
            .chain(inner.parked.values())
            .map(|item| item.owner.clone())
            .collect();
        Ok(owners.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{AttentionType, NewItem};
    use chrono::TimeZone;

    fn item(owner: &str, hour: u32) -> WorkItem {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap();
        WorkItem::from_new(
            NewItem::new(owner, "write", start, 60, AttentionType::Create, "main"),
            start,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_cas_rejects_stale_version() {
        let store = MemoryItemStore::new();
        let mut it = item("ana", 9);
        store.upsert_live(&it).await.unwrap();

        let stale = it.version;
        it.title = "rewrite".into();
        it.version += 1;
        assert!(store.update_live_if(&it, stale).await.unwrap());
        assert!(!store.update_live_if(&it, stale).await.unwrap());
        assert_eq!(store.get_live(&it.id).await.unwrap().unwrap().title, "rewrite");
    }

    #[tokio::test]
    async fn test_injected_failures_are_transient_and_bounded() {
        let store = MemoryItemStore::new();
        let it = item("ana", 9);
        store.fail_next(StoreOp::UpsertParked, 1);

        let err = store.upsert_parked(&it).await.unwrap_err();
        assert!(err.is_transient());
        store.upsert_parked(&it).await.unwrap();
        store.upsert_parked(&it).await.unwrap();
        assert_eq!(store.counts(), (0, 1));
    }

    #[tokio::test]
    async fn test_listing_is_owner_scoped_and_ordered() {
        let store = MemoryItemStore::new();
        store.upsert_live(&item("ana", 11)).await.unwrap();
        store.upsert_live(&item("ana", 9)).await.unwrap();
        store.upsert_parked(&item("bo", 10)).await.unwrap();

        let ana = store.list_live("ana", None).await.unwrap();
        assert_eq!(ana.len(), 2);
        assert!(ana[0].start_time < ana[1].start_time);
        assert_eq!(store.owners().await.unwrap(), vec!["ana", "bo"]);
    }
}
