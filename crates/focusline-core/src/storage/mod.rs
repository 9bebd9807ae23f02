//! Persistence adapters and configuration.
//!
//! - [`ItemStore`]: partitioned work-item store (live / parked)
//! - [`CompletionSink`]: consumer of completion records
//! - [`Config`]: TOML configuration under the data directory

mod completion_log;
mod config;
mod item_db;
mod memory;
mod traits;

pub use completion_log::{CompletionRecord, JsonlCompletionSink, MemoryCompletionSink};
pub use config::{
    Config, DefaultsConfig, LifecycleConfig, RetryConfig, RolesConfig, ScoreWeights,
    ScoringConfig, SuggestConfig, WorkdayConfig,
};
pub use item_db::SqliteItemStore;
pub use memory::{MemoryItemStore, StoreOp};
pub use traits::{CompletionSink, ItemStore, Partition};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `FOCUSLINE_DATA_DIR` wins when set. Otherwise `~/.config/focusline[-dev]/`
/// based on `FOCUSLINE_ENV` (set `FOCUSLINE_ENV=dev` for the dev directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("FOCUSLINE_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("FOCUSLINE_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("focusline-dev")
            } else {
                base_dir.join("focusline")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
