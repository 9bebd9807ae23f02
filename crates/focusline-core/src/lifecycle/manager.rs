//! Lifecycle manager: the only writer of item status.
//!
//! Every mutation runs in two phases:
//! 1. **prepare**: take the per-item lock and look the item up. Bounded by
//!    the caller's timeout; expiry writes nothing. A leftover relocation
//!    claim found here is repaired after the timed section, under the lock.
//! 2. **commit**: apply and write (compare-and-swap on `version`). Never
//!    interrupted once started.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::locks::{KeyGuard, KeyedLocks};
use super::outcome::{LocatedItem, MutationOutcome};
use super::retry::RetryPolicy;
use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, Result, ValidationError};
use crate::storage::{
    CompletionRecord, CompletionSink, ItemStore, LifecycleConfig, MemoryCompletionSink, Partition,
};
use crate::timeline::{ItemPatch, ItemStatus, NewItem, WorkItem};

/// What the prepare phase found.
enum Prepared {
    Live(KeyGuard, WorkItem),
    Parked(KeyGuard, WorkItem),
    Missing,
}

/// Outcome of the timed part of prepare.
enum Lookup {
    Ready(Prepared),
    /// Live copy still carries a Parked claim; needs reconciliation
    StaleClaim(KeyGuard),
}

/// Owns item status transitions, partition moves and completion records.
pub struct LifecycleManager {
    pub(super) store: Arc<dyn ItemStore>,
    sink: Arc<dyn CompletionSink>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) config: LifecycleConfig,
    pub(super) retry: RetryPolicy,
    pub(super) item_locks: KeyedLocks,
    pub(super) owner_locks: KeyedLocks,
}

impl LifecycleManager {
    /// Manager with default thresholds, the system clock and an in-memory sink.
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self {
            store,
            sink: Arc::new(MemoryCompletionSink::new()),
            clock: Arc::new(SystemClock),
            config: LifecycleConfig::default(),
            retry: RetryPolicy::default(),
            item_locks: KeyedLocks::new(),
            owner_locks: KeyedLocks::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn CompletionSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ItemStore> {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Active or Logjam, from how overdue the item is at `now`.
    pub fn open_status(&self, item: &WorkItem, now: DateTime<Utc>) -> ItemStatus {
        if item.overdue_minutes(now) >= self.config.logjam_threshold_minutes as i64 {
            ItemStatus::Logjam
        } else {
            ItemStatus::Active
        }
    }

    // === Reads ===

    /// Validate and insert a new Active item.
    pub async fn create_item(&self, new: NewItem) -> Result<WorkItem> {
        let now = self.now();
        let item = WorkItem::from_new(new, now)?;
        self.retry
            .run("upsert_live", || self.store.upsert_live(&item))
            .await?;
        tracing::info!("created item {} for {}", item.id, item.owner);
        Ok(item)
    }

    /// Find an item in either partition; live wins if both copies exist.
    pub async fn get_item(&self, id: &str) -> Result<Option<LocatedItem>> {
        if let Some(item) = self.retry.run("get_live", || self.store.get_live(id)).await? {
            return Ok(Some(LocatedItem {
                partition: Partition::Live,
                item,
            }));
        }
        let parked = self
            .retry
            .run("get_parked", || self.store.get_parked(id))
            .await?;
        Ok(parked.map(|item| LocatedItem {
            partition: Partition::Parked,
            item,
        }))
    }

    /// Live items of `owner` starting inside `[from, to)`, or all of them.
    pub async fn list_live(
        &self,
        owner: &str,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<WorkItem>> {
        Ok(self
            .retry
            .run("list_live", || self.store.list_live(owner, range))
            .await?)
    }

    pub async fn list_parked(&self, owner: &str) -> Result<Vec<WorkItem>> {
        Ok(self
            .retry
            .run("list_parked", || self.store.list_parked(owner))
            .await?)
    }

    // === Mutations ===

    /// Mark an Active or Logjam item Completed and emit its completion record.
    ///
    /// Completing an already Completed item is a no-op success.
    pub async fn complete_item(
        &self,
        id: &str,
        timeout: Option<Duration>,
    ) -> Result<MutationOutcome> {
        let (_guard, mut item) = match self.prepare("complete_item", id, timeout).await? {
            Prepared::Live(guard, item) => (guard, item),
            Prepared::Parked(_, item) => return Ok(MutationOutcome::AlreadyParked(item)),
            Prepared::Missing => return Ok(MutationOutcome::NotFound),
        };

        if item.status == ItemStatus::Completed {
            return Ok(MutationOutcome::Success(item));
        }
        if !item.status.can_transition_to(&ItemStatus::Completed) {
            return Err(CoreError::InvalidTransition {
                from: item.status,
                to: ItemStatus::Completed,
            });
        }

        let now = self.now();
        let expected = item.version;
        item.status = ItemStatus::Completed;
        item.completed_at = Some(now);
        item.touch(now);
        self.commit_live(&item, expected).await?;
        tracing::info!("completed item {}", item.id);

        self.emit_completion(&item, now).await;
        Ok(MutationOutcome::Success(item))
    }

    /// Apply a patch to a live, non-completed item and recompute its status.
    pub async fn update_item(
        &self,
        id: &str,
        patch: ItemPatch,
        timeout: Option<Duration>,
    ) -> Result<MutationOutcome> {
        patch.validate()?;
        self.patch_item("update_item", id, patch, timeout).await
    }

    /// Move an item's start time.
    pub async fn reschedule_item(
        &self,
        id: &str,
        new_start: DateTime<Utc>,
        timeout: Option<Duration>,
    ) -> Result<MutationOutcome> {
        self.patch_item("reschedule_item", id, ItemPatch::reschedule(new_start), timeout)
            .await
    }

    async fn patch_item(
        &self,
        operation: &'static str,
        id: &str,
        patch: ItemPatch,
        timeout: Option<Duration>,
    ) -> Result<MutationOutcome> {
        let (_guard, mut item) = match self.prepare(operation, id, timeout).await? {
            Prepared::Live(guard, item) => (guard, item),
            Prepared::Parked(_, item) => return Ok(MutationOutcome::AlreadyParked(item)),
            Prepared::Missing => return Ok(MutationOutcome::NotFound),
        };

        if item.status == ItemStatus::Completed {
            return Err(CoreError::InvalidTransition {
                from: ItemStatus::Completed,
                to: ItemStatus::Active,
            });
        }
        if patch.is_empty() {
            return Ok(MutationOutcome::Success(item));
        }

        let now = self.now();
        let expected = item.version;
        patch.apply_to(&mut item);
        item.status = self.open_status(&item, now);
        item.touch(now);
        self.commit_live(&item, expected).await?;
        tracing::debug!("{operation}: item {} now {}", item.id, item.status.as_str());
        Ok(MutationOutcome::Success(item))
    }

    /// Move a parked item back to the live partition.
    ///
    /// The item's status is recomputed and `unparked_at` is set, which
    /// shields it from the sweep for the configured grace period. Unparking
    /// an item that is already live returns it unchanged.
    pub async fn unpark_item(
        &self,
        id: &str,
        timeout: Option<Duration>,
    ) -> Result<MutationOutcome> {
        let (_guard, parked) = match self.prepare("unpark_item", id, timeout).await? {
            Prepared::Parked(guard, item) => (guard, item),
            Prepared::Live(_, item) => return Ok(MutationOutcome::Success(item)),
            Prepared::Missing => return Ok(MutationOutcome::NotFound),
        };

        let now = self.now();
        let mut item = parked.clone();
        item.status = self.open_status(&item, now);
        item.parked_at = None;
        item.unparked_at = Some(now);
        item.touch(now);

        self.retry
            .run("upsert_live", || self.store.upsert_live(&item))
            .await?;
        if let Err(err) = self
            .retry
            .run("delete_parked", || self.store.delete_parked(id))
            .await
        {
            tracing::warn!("unpark of {id}: parked copy not removed ({err}); left for reconciliation");
        }
        tracing::info!("unparked item {id}");
        Ok(MutationOutcome::Success(item))
    }

    // === Phases ===

    /// Lock the item and find it. Bounded by `timeout`.
    async fn prepare(
        &self,
        operation: &'static str,
        id: &str,
        timeout: Option<Duration>,
    ) -> Result<Prepared> {
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "item_id" }.into());
        }
        let limit = timeout.unwrap_or_else(|| self.config.mutation_timeout());
        let found = match tokio::time::timeout(limit, self.lookup(id)).await {
            Ok(found) => found?,
            Err(_) => {
                tracing::warn!("{operation} on {id} timed out after {limit:?} before committing");
                return Err(CoreError::Timeout {
                    operation,
                    item_id: id.to_string(),
                });
            }
        };
        match found {
            Lookup::Ready(prepared) => Ok(prepared),
            Lookup::StaleClaim(guard) => {
                // Repair writes are never cut short by the caller's timeout
                self.reconcile_locked(id, self.now()).await?;
                let live = self.retry.run("get_live", || self.store.get_live(id)).await?;
                self.resolve(guard, id, live).await
            }
        }
    }

    /// Reads only; never writes.
    async fn lookup(&self, id: &str) -> Result<Lookup> {
        let guard = self.item_locks.lock(id).await;
        let live = self.retry.run("get_live", || self.store.get_live(id)).await?;
        if live.as_ref().is_some_and(|item| item.status == ItemStatus::Parked) {
            // Leftover claim from an interrupted relocation
            return Ok(Lookup::StaleClaim(guard));
        }
        self.resolve(guard, id, live).await.map(Lookup::Ready)
    }

    async fn resolve(&self, guard: KeyGuard, id: &str, live: Option<WorkItem>) -> Result<Prepared> {
        if let Some(item) = live {
            return Ok(Prepared::Live(guard, item));
        }

        let parked = self
            .retry
            .run("get_parked", || self.store.get_parked(id))
            .await?;
        Ok(match parked {
            Some(item) => Prepared::Parked(guard, item),
            None => Prepared::Missing,
        })
    }

    /// CAS write of a live item; a lost race is a [`CoreError::ConcurrencyConflict`].
    async fn commit_live(&self, item: &WorkItem, expected_version: u64) -> Result<()> {
        let written = self
            .retry
            .run("update_live_if", || self.store.update_live_if(item, expected_version))
            .await?;
        if written {
            Ok(())
        } else {
            Err(CoreError::ConcurrencyConflict {
                item_id: item.id.clone(),
            })
        }
    }

    async fn emit_completion(&self, item: &WorkItem, completed_at: DateTime<Utc>) {
        let record = CompletionRecord::from_item(item, completed_at);
        let window = self.config.min_completion_minutes..=self.config.max_completion_minutes;
        if !window.contains(&record.actual_minutes) {
            tracing::debug!(
                "completion record for {} dropped: {} actual minutes outside {:?}",
                item.id,
                record.actual_minutes,
                window
            );
            return;
        }
        if let Err(err) = self.sink.record(&record).await {
            tracing::warn!("completion record for {} not delivered: {err}", item.id);
        }
    }
}
