//! Core error types for focusline-core.
//!
//! This module defines the error hierarchy using thiserror. Expected races
//! (an item parked by the sweep while a mutation was in flight) are NOT
//! errors; they travel as [`MutationOutcome`](crate::lifecycle::MutationOutcome)
//! variants instead.

use std::path::PathBuf;
use thiserror::Error;

use crate::timeline::ItemStatus;

/// Core error type for focusline-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Genuine absence of an item in both partitions
    #[error("Item not found: {item_id}")]
    NotFound { item_id: String },

    /// Rejected input; nothing was written
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// Store errors (transient ones are retried before surfacing)
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A foreign writer changed the item between read and write
    #[error("Concurrent modification of item {item_id}; retry the operation")]
    ConcurrencyConflict { item_id: String },

    /// Status transition not allowed by the lifecycle state machine
    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: ItemStatus, to: ItemStatus },

    /// Caller timeout expired before anything was written
    #[error("{operation} on item {item_id} timed out before committing; safe to retry")]
    Timeout {
        operation: &'static str,
        item_id: String,
    },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Whether the caller can reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Store(err) => err.is_transient(),
            CoreError::ConcurrencyConflict { .. } | CoreError::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Errors raised by an [`ItemStore`](crate::storage::ItemStore) or
/// [`CompletionSink`](crate::storage::CompletionSink) adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transient infrastructure failure (busy database, lost connection)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Database-level failure
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Stored row could not be decoded
    #[error("Corrupt record {id}: {message}")]
    Corrupt { id: String, message: String },
}

impl StoreError {
    /// Transient errors are retried with backoff by the lifecycle manager.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::Database(DatabaseError::Locked)
        )
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is busy or locked by another connection
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home or data directory unavailable
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Duration must be strictly positive
    #[error("Duration must be positive, got {minutes} minutes")]
    NonPositiveDuration { minutes: i64 },

    /// Required text field is blank
    #[error("Field '{field}' must not be empty")]
    EmptyField { field: &'static str },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => match inner.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    DatabaseError::Locked
                }
                _ => DatabaseError::QueryFailed(err.to_string()),
            },
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(DatabaseError::from(err))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
