//! Subcommand implementations. Every command prints JSON on stdout.

pub mod analysis;
pub mod config;
pub mod item;
pub mod sweep;

use focusline_core::{Config, MutationOutcome, TimelineEngine};
use serde::Serialize;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Engine over the on-disk store, configured from `config.toml`.
pub fn open_engine() -> Result<TimelineEngine, Box<dyn std::error::Error>> {
    let config = Config::load()?;
    tracing::debug!("using config at {}", Config::path()?.display());
    Ok(TimelineEngine::open(&config)?)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Success prints the item; a parked item prints where it went.
pub fn print_outcome(outcome: MutationOutcome, id: &str) -> CliResult {
    let outcome = outcome.into_result(id)?;
    if let Some(message) = outcome.redirect_message() {
        println!("{message}");
        return Ok(());
    }
    match outcome.item() {
        Some(item) => print_json(item),
        None => Ok(()),
    }
}
