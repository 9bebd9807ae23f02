//! Score, suggest and slot commands.

use chrono::NaiveDate;
use clap::Args;
use focusline_core::{AttentionType, Role, Zone};

use super::{open_engine, print_json, CliResult};

#[derive(Args)]
pub struct DayArgs {
    #[arg(long)]
    pub owner: String,
    /// Day to analyse (YYYY-MM-DD, UTC); defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,
    /// maker, marker or multiplier; defaults to the configured role
    #[arg(long)]
    pub role: Option<Role>,
    /// peacetime or wartime; defaults to the configured zone
    #[arg(long)]
    pub zone: Option<Zone>,
}

#[derive(Args)]
pub struct SlotArgs {
    #[arg(long)]
    pub owner: String,
    /// Attention type of the new item
    #[arg(long = "type")]
    pub attention_type: AttentionType,
    /// Length of the new item in minutes
    #[arg(long)]
    pub duration: i64,
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub role: Option<Role>,
    #[arg(long)]
    pub zone: Option<Zone>,
}

pub async fn score(args: DayArgs) -> CliResult {
    let engine = open_engine()?;
    let date = args.date.unwrap_or_else(|| engine.now().date_naive());
    let budget = engine.budget(args.role, args.zone);
    let score = engine
        .score_day(&args.owner, date, budget.role, budget.zone)
        .await?;
    print_json(&score)
}

pub async fn suggest(args: DayArgs) -> CliResult {
    let engine = open_engine()?;
    let date = args.date.unwrap_or_else(|| engine.now().date_naive());
    let budget = engine.budget(args.role, args.zone);
    let suggestions = engine
        .suggest(&args.owner, date, budget.role, budget.zone)
        .await?;
    print_json(&suggestions)
}

pub async fn slot(args: SlotArgs) -> CliResult {
    let engine = open_engine()?;
    let date = args.date.unwrap_or_else(|| engine.now().date_naive());
    let slots = engine
        .find_slot(
            &args.owner,
            args.attention_type,
            args.duration,
            date,
            args.role,
            args.zone,
        )
        .await?;
    print_json(&slots)
}
