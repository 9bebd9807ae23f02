//! # Focusline Core Library
//!
//! Timeline scheduling and attention-optimization engine. All operations are
//! available through the standalone `focusline` CLI, which is a thin layer
//! over this library.
//!
//! ## Architecture
//!
//! - **Lifecycle**: race-safe mutations plus a periodic sweep that moves
//!   stale items Active → Logjam → Parked
//! - **Attention model**: role (Maker/Marker/Multiplier) and zone
//!   (Peacetime/Wartime) budgets
//! - **Analysis**: role-fit scoring, optimization suggestions and slot finding
//!   over a snapshot of one owner's day
//! - **Storage**: SQLite item store, JSON-lines completion log and TOML
//!   configuration
//!
//! ## Key Components
//!
//! - [`TimelineEngine`]: facade over every operation
//! - [`LifecycleManager`]: sole writer of item status
//! - [`RoleFitScorer`], [`SuggestionEngine`], [`SlotFinder`]: pure analysis
//! - [`Config`]: application configuration management

pub mod attention;
pub mod clock;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod optimizer;
pub mod scheduler;
pub mod scoring;
pub mod storage;
pub mod timeline;

pub use attention::{AttentionBudgetConfig, AttentionModel, Role, Zone};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::TimelineEngine;
pub use error::{ConfigError, CoreError, DatabaseError, Result, StoreError, ValidationError};
pub use lifecycle::{LifecycleManager, LocatedItem, MutationOutcome, SweepDriver, SweepReport};
pub use optimizer::{
    OptimizationSuggestion, Priority, ProposedChange, SuggestionEngine, SuggestionKind,
};
pub use scheduler::{SlotCandidate, SlotFinder, SlotQuery};
pub use scoring::{RoleFitScore, RoleFitScorer, ScoreBreakdown};
pub use storage::{Config, ItemStore, Partition};
pub use timeline::{AttentionType, ItemPatch, ItemStatus, NewItem, WorkItem, MAX_DURATION_MINUTES};
