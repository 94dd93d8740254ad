//! Sync coordination: the status state machine and its background driver.
//!
//! The [`SyncCoordinator`] is the sole authority for moving events between
//! `pending`, `synced` and `rejected`, and the only writer of the
//! in-memory pending set.

pub mod auto;
pub mod coordinator;

pub use auto::run_auto_sync;
pub use coordinator::{
    EnqueueOutcome, SyncCoordinator, SyncError, SyncOutcome, SyncStats, SyncTally,
};
