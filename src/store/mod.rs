//! Durable device-local storage for collection events and cached
//! credentials.
//!
//! The [`EventStore`] trait abstracts the backend so the sync coordinator
//! can be tested against an in-memory fake:
//! - [`SledEventStore`]: sled-backed store for real devices
//! - [`MemoryEventStore`]: in-memory store for tests and minimal
//!   deployments

pub mod memory;
pub mod sled_store;

pub use memory::MemoryEventStore;
pub use sled_store::SledEventStore;

use crate::types::{CollectionEvent, CollectorCredential, EventStatus, StatusFilter};
use serde::{Deserialize, Serialize};

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Insert with an id that already exists. Client-generated ids make
    /// this unreachable in practice, but it is checked anyway.
    #[error("duplicate event id: {0}")]
    DuplicateId(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Aggregate counts over the events table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub pending: usize,
    pub synced: usize,
    pub rejected: usize,
}

/// Trait for pluggable event storage backends.
///
/// Implementations must be thread-safe (`Send + Sync`) for shared access
/// across async tasks. Operations are synchronous: local store work is
/// fast and non-suspending, and the coordinator awaits nothing between a
/// write and the matching in-memory projection update.
pub trait EventStore: Send + Sync {
    /// Insert a new event. The event must carry status `Pending`.
    ///
    /// Fails with [`StoreError::DuplicateId`] if the id already exists.
    fn save(&self, event: &CollectionEvent) -> Result<(), StoreError>;

    /// Point lookup by event id.
    fn get(&self, id: &str) -> Result<Option<CollectionEvent>, StoreError>;

    /// History query: newest first, capped at
    /// [`crate::config::defaults::HISTORY_PAGE_CAP`] rows.
    fn list_by_status(&self, filter: StatusFilter) -> Result<Vec<CollectionEvent>, StoreError>;

    /// All pending events in creation order, uncapped.
    ///
    /// Used only to rebuild the coordinator's pending set at startup; the
    /// capped [`Self::list_by_status`] stays the query for history views.
    fn load_pending(&self) -> Result<Vec<CollectionEvent>, StoreError>;

    /// Atomic status transition.
    ///
    /// Returns `Ok(false)` (a no-op, not an error) when the id is unknown;
    /// the coordinator logs that as a logic error and carries on. `tx_id`
    /// and `synced_at` are set on transition to `Synced` and cleared
    /// otherwise, so the "`tx_id` iff synced" invariant holds by
    /// construction.
    fn update_status(
        &self,
        id: &str,
        status: EventStatus,
        tx_id: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Remove an event permanently. Deleting an unknown id is not an error.
    fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Destructive reset of both tables. Explicit user action only; sync
    /// logic never calls this.
    fn clear_all(&self) -> Result<(), StoreError>;

    /// Cache a credential, overwriting any previous entry for the same
    /// collector id.
    fn cache_credential(&self, credential: &CollectorCredential) -> Result<(), StoreError>;

    /// Exact-match credential lookup. A hash mismatch or absent id is
    /// `Ok(None)`, not an error.
    fn lookup_credential(
        &self,
        collector_id: &str,
        pin_hash: &str,
    ) -> Result<Option<CollectorCredential>, StoreError>;

    /// Aggregate counts for the stats card.
    fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;
}
