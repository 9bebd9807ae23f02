use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::storage::Partition;
use crate::timeline::WorkItem;

/// Result of a lifecycle mutation.
///
/// `AlreadyParked` is a normal outcome: the sweep moved the item between the
/// caller's read and write. Callers translate it into a redirect, not a
/// failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "item", rename_all = "snake_case")]
pub enum MutationOutcome {
    Success(WorkItem),
    AlreadyParked(WorkItem),
    NotFound,
}

impl MutationOutcome {
    pub fn item(&self) -> Option<&WorkItem> {
        match self {
            Self::Success(item) | Self::AlreadyParked(item) => Some(item),
            Self::NotFound => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// User-facing "this item moved" message for `AlreadyParked`.
    pub fn redirect_message(&self) -> Option<String> {
        match self {
            Self::AlreadyParked(item) => Some(format!(
                "this item moved to the parked list: '{}' ({}) was parked{}; \
                 run `focusline item unpark {}` to bring it back",
                item.title,
                item.id,
                item.parked_at
                    .map(|at| format!(" at {}", at.format("%Y-%m-%d %H:%M UTC")))
                    .unwrap_or_default(),
                item.id,
            )),
            _ => None,
        }
    }

    /// Turn `NotFound` into [`CoreError::NotFound`].
    pub fn into_result(self, item_id: &str) -> Result<Self> {
        match self {
            Self::NotFound => Err(CoreError::NotFound {
                item_id: item_id.to_string(),
            }),
            other => Ok(other),
        }
    }
}

/// An item together with the partition it was found in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedItem {
    pub partition: Partition,
    pub item: WorkItem,
}
