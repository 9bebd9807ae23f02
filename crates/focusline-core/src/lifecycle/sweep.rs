//! Periodic sweep: reconcile duplicates, park stale items, refresh Logjam.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::manager::LifecycleManager;
use crate::error::{Result, StoreError};
use crate::timeline::{ItemStatus, WorkItem};

/// Per-item or per-owner failure inside a sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepFailure {
    pub owner: String,
    pub item_id: Option<String>,
    pub error: String,
}

/// Summary of one sweep run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    /// Items relocated to the parked partition by this run
    pub parked: usize,
    /// Items that entered Logjam this run
    pub logjammed: usize,
    /// Duplicates or stale claims repaired
    pub reconciled: usize,
    /// Owners another sweep was already processing
    pub skipped_owners: Vec<String>,
    pub failures: Vec<SweepFailure>,
}

/// What the sweep did with one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemAction {
    Untouched,
    Parked,
    Logjammed,
    Reactivated,
}

impl LifecycleManager {
    /// Run one sweep over every owner at `now`.
    ///
    /// Parks Active/Logjam items overdue by at least the park threshold,
    /// moves the rest between Active and Logjam, and repairs duplicates left
    /// by interrupted relocations. Running it twice at the same `now` is a
    /// no-op the second time. An owner already being swept elsewhere is
    /// skipped, not waited on.
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let owners = self.retry.run("owners", || self.store.owners()).await?;
        let mut report = SweepReport::default();

        for owner in owners {
            let Some(_token) = self.owner_locks.try_lock(&owner) else {
                tracing::debug!("sweep: owner {owner} busy, skipping");
                report.skipped_owners.push(owner);
                continue;
            };
            if let Err(err) = self.sweep_owner(&owner, now, &mut report).await {
                tracing::warn!("sweep of owner {owner} aborted: {err}");
                report.failures.push(SweepFailure {
                    owner: owner.clone(),
                    item_id: None,
                    error: err.to_string(),
                });
            }
        }

        if report.parked > 0 || report.reconciled > 0 {
            tracing::info!(
                "sweep parked {} item(s), reconciled {}",
                report.parked,
                report.reconciled
            );
        }
        Ok(report)
    }

    async fn sweep_owner(
        &self,
        owner: &str,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<(), StoreError> {
        // Phase 1: reconciliation
        let parked_ids: HashSet<String> = self
            .retry
            .run("list_parked", || self.store.list_parked(owner))
            .await?
            .into_iter()
            .map(|item| item.id)
            .collect();
        let live = self
            .retry
            .run("list_live", || self.store.list_live(owner, None))
            .await?;

        for item in live
            .iter()
            .filter(|item| item.status == ItemStatus::Parked || parked_ids.contains(&item.id))
        {
            let _guard = self.item_locks.lock(&item.id).await;
            match self.reconcile_locked(&item.id, now).await {
                Ok(true) => report.reconciled += 1,
                Ok(false) => {}
                Err(err) => report.failures.push(SweepFailure {
                    owner: owner.to_string(),
                    item_id: Some(item.id.clone()),
                    error: err.to_string(),
                }),
            }
        }

        // Phase 2: status refresh and parking
        let live = self
            .retry
            .run("list_live", || self.store.list_live(owner, None))
            .await?;

        for snapshot in live.iter().filter(|item| item.status.is_open()) {
            if self.in_unpark_grace(snapshot, now) {
                continue;
            }
            let _guard = self.item_locks.lock(&snapshot.id).await;
            match self.sweep_item(&snapshot.id, now).await {
                Ok(ItemAction::Parked) => report.parked += 1,
                Ok(ItemAction::Logjammed) => report.logjammed += 1,
                Ok(ItemAction::Reactivated | ItemAction::Untouched) => {}
                Err(err) => {
                    tracing::warn!("sweep of item {}: {err}", snapshot.id);
                    report.failures.push(SweepFailure {
                        owner: owner.to_string(),
                        item_id: Some(snapshot.id.clone()),
                        error: err.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    fn in_unpark_grace(&self, item: &WorkItem, now: DateTime<Utc>) -> bool {
        item.unparked_at
            .is_some_and(|at| now - at < self.config.unpark_grace())
    }

    /// Re-evaluate one item under its lock. The snapshot may be stale, so the
    /// item is read again first.
    async fn sweep_item(&self, id: &str, now: DateTime<Utc>) -> Result<ItemAction, StoreError> {
        let Some(current) = self.retry.run("get_live", || self.store.get_live(id)).await? else {
            return Ok(ItemAction::Untouched);
        };
        if !current.status.is_open() || self.in_unpark_grace(&current, now) {
            return Ok(ItemAction::Untouched);
        }

        if current.overdue_minutes(now) >= self.config.park_threshold_minutes as i64 {
            return self.relocate(current, now).await;
        }

        let target = self.open_status(&current, now);
        if target == current.status {
            return Ok(ItemAction::Untouched);
        }

        let expected = current.version;
        let mut next = current;
        next.status = target;
        next.touch(now);
        let written = self
            .retry
            .run("update_live_if", || self.store.update_live_if(&next, expected))
            .await?;
        if !written {
            tracing::debug!("sweep: item {id} changed concurrently; re-evaluated next run");
            return Ok(ItemAction::Untouched);
        }
        Ok(match target {
            ItemStatus::Logjam => ItemAction::Logjammed,
            _ => ItemAction::Reactivated,
        })
    }

    /// Two-step move to the parked partition: claim, insert, delete.
    async fn relocate(&self, current: WorkItem, now: DateTime<Utc>) -> Result<ItemAction, StoreError> {
        let id = current.id.clone();
        let expected = current.version;

        let mut claimed = current.clone();
        claimed.status = ItemStatus::Parked;
        claimed.parked_at = Some(now);
        claimed.touch(now);

        let won = self
            .retry
            .run("update_live_if", || self.store.update_live_if(&claimed, expected))
            .await?;
        if !won {
            tracing::debug!("sweep: item {id} changed concurrently; not parked this run");
            return Ok(ItemAction::Untouched);
        }

        if let Err(err) = self
            .retry
            .run("upsert_parked", || self.store.upsert_parked(&claimed))
            .await
        {
            let mut restored = claimed.clone();
            restored.status = current.status;
            restored.parked_at = current.parked_at;
            restored.touch(now);
            match self
                .retry
                .run("update_live_if", || self.store.update_live_if(&restored, claimed.version))
                .await
            {
                Ok(true) => {}
                Ok(false) | Err(_) => tracing::warn!(
                    "sweep: claim on {id} not rolled back; restored by next reconciliation"
                ),
            }
            return Err(err);
        }

        if let Err(err) = self
            .retry
            .run("delete_live", || self.store.delete_live(&id))
            .await
        {
            tracing::warn!("sweep: item {id} parked but live copy not removed ({err}); left for reconciliation");
        }
        tracing::debug!("sweep: parked item {id}");
        Ok(ItemAction::Parked)
    }

    /// Repair the copies of one item. Caller holds the item lock.
    ///
    /// Returns whether anything was changed.
    pub(super) async fn reconcile_locked(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let live = self.retry.run("get_live", || self.store.get_live(id)).await?;
        let parked = self
            .retry
            .run("get_parked", || self.store.get_parked(id))
            .await?;

        match (live, parked) {
            // Relocation finished its insert: the parked copy is authoritative
            (Some(live), Some(_)) if live.status == ItemStatus::Parked => {
                self.retry
                    .run("delete_live", || self.store.delete_live(id))
                    .await?;
                tracing::info!("reconciled {id}: removed stale live copy");
                Ok(true)
            }
            // Relocation aborted before its insert: undo the claim
            (Some(live), None) if live.status == ItemStatus::Parked => {
                let expected = live.version;
                let mut restored = live;
                restored.parked_at = None;
                restored.status = self.open_status(&restored, now);
                restored.touch(now);
                let written = self
                    .retry
                    .run("update_live_if", || self.store.update_live_if(&restored, expected))
                    .await?;
                if written {
                    tracing::info!("reconciled {id}: aborted relocation restored as {}", restored.status.as_str());
                }
                Ok(written)
            }
            // Interrupted unpark: the later transition wins, ties keep the live copy
            (Some(live), Some(parked)) => {
                let live_is_newer = match (live.unparked_at, parked.parked_at) {
                    (Some(unparked), Some(parked_at)) => unparked >= parked_at,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if live_is_newer {
                    self.retry
                        .run("delete_parked", || self.store.delete_parked(id))
                        .await?;
                    tracing::info!("reconciled {id}: removed stale parked copy");
                } else {
                    self.retry
                        .run("delete_live", || self.store.delete_live(id))
                        .await?;
                    tracing::info!("reconciled {id}: removed stale live copy");
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
