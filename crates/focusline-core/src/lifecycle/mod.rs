//! Item lifecycle: status transitions, parking and reconciliation.
//!
//! ```text
//! Active ──overdue ≥ logjam──▶ Logjam
//!   │  ◀──rescheduled/patched───┘
//!   ├──overdue ≥ park──▶ Parked (parked partition) ──unpark──▶ Active/Logjam
//!   └──complete──▶ Completed (terminal)
//! ```

mod driver;
mod locks;
mod manager;
mod outcome;
mod retry;
mod sweep;

pub use driver::SweepDriver;
pub use locks::{KeyGuard, KeyedLocks};
pub use manager::LifecycleManager;
pub use outcome::{LocatedItem, MutationOutcome};
pub use retry::RetryPolicy;
pub use sweep::{SweepFailure, SweepReport};
