//! Timeline engine facade.
//!
//! Wires the store, completion sink, clock and configuration together and
//! exposes the public operations. Read-side operations (`score_day`,
//! `suggest`, `find_slot`) fetch one snapshot of the owner's day and then run
//! pure computation over it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use crate::attention::{AttentionBudgetConfig, AttentionModel, Role, Zone};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::lifecycle::{
    LifecycleManager, LocatedItem, MutationOutcome, RetryPolicy, SweepDriver, SweepReport,
};
use crate::optimizer::{OptimizationSuggestion, SuggestionEngine};
use crate::scheduler::{SlotCandidate, SlotFinder, SlotQuery};
use crate::scoring::{RoleFitScore, RoleFitScorer};
use crate::storage::{
    CompletionSink, Config, DefaultsConfig, ItemStore, JsonlCompletionSink, MemoryCompletionSink,
    MemoryItemStore, SqliteItemStore,
};
use crate::timeline::{day_bounds, AttentionType, ItemPatch, NewItem, WorkItem};

/// Entry point for every engine operation.
pub struct TimelineEngine {
    lifecycle: Arc<LifecycleManager>,
    model: AttentionModel,
    scorer: RoleFitScorer,
    suggestions: SuggestionEngine,
    slots: SlotFinder,
    defaults: DefaultsConfig,
    mutation_timeout: Duration,
}

impl TimelineEngine {
    /// Build an engine from explicit collaborators.
    ///
    /// # Errors
    /// Returns an error if the configuration does not validate.
    pub fn new(
        config: &Config,
        store: Arc<dyn ItemStore>,
        sink: Arc<dyn CompletionSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let model = config.attention_model()?;
        let slots = SlotFinder::from_config(&config.workday);

        let lifecycle = LifecycleManager::new(store)
            .with_sink(sink)
            .with_clock(clock)
            .with_config(config.lifecycle.clone())
            .with_retry(RetryPolicy::from_config(&config.retry));

        Ok(Self {
            lifecycle: Arc::new(lifecycle),
            model,
            scorer: RoleFitScorer::from_config(&config.scoring),
            suggestions: SuggestionEngine::from_config(config.suggest.clone(), slots.clone()),
            slots,
            defaults: config.defaults.clone(),
            mutation_timeout: config.lifecycle.mutation_timeout(),
        })
    }

    /// Engine over the SQLite store and JSON-lines completion log in the
    /// data directory, on the system clock.
    pub fn open(config: &Config) -> Result<Self> {
        let store = SqliteItemStore::open()?;
        let sink = JsonlCompletionSink::open()?;
        Self::new(config, Arc::new(store), Arc::new(sink), Arc::new(SystemClock))
    }

    /// Engine over in-memory adapters.
    pub fn in_memory(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::new(
            config,
            Arc::new(MemoryItemStore::new()),
            Arc::new(MemoryCompletionSink::new()),
            clock,
        )
    }

    pub fn lifecycle(&self) -> &Arc<LifecycleManager> {
        &self.lifecycle
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.lifecycle.now()
    }

    /// Sweep driver on the configured interval.
    pub fn sweep_driver(&self) -> SweepDriver {
        SweepDriver::new(Arc::clone(&self.lifecycle))
    }

    /// Budget for `(role, zone)`, falling back to the configured defaults.
    pub fn budget(&self, role: Option<Role>, zone: Option<Zone>) -> AttentionBudgetConfig {
        self.model.resolve(
            role.unwrap_or(self.defaults.role),
            zone.unwrap_or(self.defaults.zone),
        )
    }

    // === Lifecycle ===

    pub async fn create_item(&self, new: NewItem) -> Result<WorkItem> {
        self.lifecycle.create_item(new).await
    }

    pub async fn get_item(&self, id: &str) -> Result<Option<LocatedItem>> {
        self.lifecycle.get_item(id).await
    }

    pub async fn complete_item(&self, id: &str) -> Result<MutationOutcome> {
        self.lifecycle
            .complete_item(id, Some(self.mutation_timeout))
            .await
    }

    pub async fn update_item(&self, id: &str, patch: ItemPatch) -> Result<MutationOutcome> {
        self.lifecycle
            .update_item(id, patch, Some(self.mutation_timeout))
            .await
    }

    pub async fn reschedule_item(
        &self,
        id: &str,
        new_start: DateTime<Utc>,
    ) -> Result<MutationOutcome> {
        self.lifecycle
            .reschedule_item(id, new_start, Some(self.mutation_timeout))
            .await
    }

    pub async fn unpark_item(&self, id: &str) -> Result<MutationOutcome> {
        self.lifecycle
            .unpark_item(id, Some(self.mutation_timeout))
            .await
    }

    pub async fn list_parked(&self, owner: &str) -> Result<Vec<WorkItem>> {
        self.lifecycle.list_parked(owner).await
    }

    /// Live items of `owner` starting on `date` (UTC), or all of them.
    pub async fn list_live(&self, owner: &str, date: Option<NaiveDate>) -> Result<Vec<WorkItem>> {
        self.lifecycle.list_live(owner, date.map(day_bounds)).await
    }

    /// One sweep at `now`, or at the engine clock's current time.
    pub async fn run_sweep(&self, now: Option<DateTime<Utc>>) -> Result<SweepReport> {
        let now = now.unwrap_or_else(|| self.now());
        self.lifecycle.run_sweep(now).await
    }

    // === Analysis ===

    pub async fn score_day(
        &self,
        owner: &str,
        date: NaiveDate,
        role: Role,
        zone: Zone,
    ) -> Result<RoleFitScore> {
        let items = self.day_snapshot(owner, date).await?;
        let budget = self.model.resolve(role, zone);
        Ok(self.scorer.score(&items, &budget))
    }

    pub async fn suggest(
        &self,
        owner: &str,
        date: NaiveDate,
        role: Role,
        zone: Zone,
    ) -> Result<Vec<OptimizationSuggestion>> {
        let items = self.day_snapshot(owner, date).await?;
        let budget = self.model.resolve(role, zone);
        Ok(self.suggestions.suggest(date, &items, &budget))
    }

    /// Ranked free slots for a new item. Role and zone default to the
    /// configured ones.
    pub async fn find_slot(
        &self,
        owner: &str,
        attention_type: AttentionType,
        duration_minutes: i64,
        date: NaiveDate,
        role: Option<Role>,
        zone: Option<Zone>,
    ) -> Result<Vec<SlotCandidate>> {
        let query = SlotQuery::new(attention_type, duration_minutes, date);
        let budget = self.budget(role, zone);
        // Reject bad input before touching the store
        self.slots.find(&query, &[], &budget)?;
        let items = self.day_snapshot(owner, date).await?;
        Ok(self.slots.find(&query, &items, &budget)?)
    }

    async fn day_snapshot(&self, owner: &str, date: NaiveDate) -> Result<Vec<WorkItem>> {
        let items = self.lifecycle.list_live(owner, Some(day_bounds(date))).await?;
        tracing::debug!("snapshot of {owner} on {date}: {} items", items.len());
        Ok(items)
    }
}
