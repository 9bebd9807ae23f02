//! Work item commands.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use focusline_core::{AttentionType, CoreError, ItemPatch, NewItem};

use super::{open_engine, print_json, print_outcome, CliResult};

#[derive(Subcommand)]
pub enum ItemAction {
    /// Create a new item
    Create {
        /// Item title
        title: String,
        /// Owner the item belongs to
        #[arg(long)]
        owner: String,
        /// Start time (RFC 3339, e.g. 2026-03-02T09:00:00Z)
        #[arg(long)]
        start: DateTime<Utc>,
        /// Planned duration in minutes
        #[arg(long)]
        duration: i64,
        /// Attention type: create, decide, connect, administer or consume
        #[arg(long = "type")]
        attention_type: AttentionType,
        /// Lane the item is drawn in
        #[arg(long, default_value = "main")]
        layer: String,
        /// Mark as meeting
        #[arg(long)]
        meeting: bool,
        /// Mark as non-negotiable
        #[arg(long)]
        non_negotiable: bool,
    },
    /// Show an item from either partition
    Get {
        /// Item ID
        id: String,
    },
    /// Update fields of a live item
    Update {
        /// Item ID
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        #[arg(long)]
        duration: Option<i64>,
        #[arg(long = "type")]
        attention_type: Option<AttentionType>,
        #[arg(long)]
        layer: Option<String>,
        #[arg(long)]
        meeting: Option<bool>,
        #[arg(long)]
        non_negotiable: Option<bool>,
    },
    /// Move an item's start time
    Reschedule {
        /// Item ID
        id: String,
        /// New start time (RFC 3339)
        start: DateTime<Utc>,
    },
    /// Mark an item completed
    Complete {
        /// Item ID
        id: String,
    },
    /// Bring a parked item back to the timeline
    Unpark {
        /// Item ID
        id: String,
    },
    /// List live items
    List {
        #[arg(long)]
        owner: String,
        /// Only items starting on this day (YYYY-MM-DD, UTC)
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
    },
    /// List parked items
    Parked {
        #[arg(long)]
        owner: String,
    },
}

pub async fn run(action: ItemAction) -> CliResult {
    let engine = open_engine()?;

    match action {
        ItemAction::Create {
            title,
            owner,
            start,
            duration,
            attention_type,
            layer,
            meeting,
            non_negotiable,
        } => {
            let mut new = NewItem::new(owner, title, start, duration, attention_type, layer);
            new.is_meeting = meeting;
            new.non_negotiable = non_negotiable;
            let item = engine.create_item(new).await?;
            print_json(&item)?;
        }
        ItemAction::Get { id } => match engine.get_item(&id).await? {
            Some(located) => print_json(&located)?,
            None => return Err(CoreError::NotFound { item_id: id }.into()),
        },
        ItemAction::Update {
            id,
            title,
            start,
            duration,
            attention_type,
            layer,
            meeting,
            non_negotiable,
        } => {
            let patch = ItemPatch {
                title,
                start_time: start,
                planned_duration_minutes: duration,
                attention_type,
                layer_id: layer,
                is_meeting: meeting,
                non_negotiable,
            };
            let outcome = engine.update_item(&id, patch).await?;
            print_outcome(outcome, &id)?;
        }
        ItemAction::Reschedule { id, start } => {
            let outcome = engine.reschedule_item(&id, start).await?;
            print_outcome(outcome, &id)?;
        }
        ItemAction::Complete { id } => {
            let outcome = engine.complete_item(&id).await?;
            print_outcome(outcome, &id)?;
        }
        ItemAction::Unpark { id } => {
            let outcome = engine.unpark_item(&id).await?;
            print_outcome(outcome, &id)?;
        }
        ItemAction::List { owner, date } => {
            let items = engine.list_live(&owner, date).await?;
            print_json(&items)?;
        }
        ItemAction::Parked { owner } => {
            let items = engine.list_parked(&owner).await?;
            print_json(&items)?;
        }
    }
    Ok(())
}
