//! HerbLock Field: offline-first collection sync engine
//!
//! Device-side synchronization engine for geotagged herb collection events.
//! Events are recorded locally first, survive restarts and dead network
//! paths, and are eventually committed to the remote traceability ledger,
//! which independently validates each event's coordinates against the
//! approved collection zones for its species.
//!
//! ## Architecture
//!
//! - **Event Store**: durable local record of every collection event
//!   (sled-backed, with an in-memory backend for tests)
//! - **Sync Coordinator**: sole authority for event status transitions;
//!   owns the in-memory pending set
//! - **Ledger Client**: HTTP client for the remote validation endpoint
//! - **Reachability Monitor**: periodic "is the ledger plausibly
//!   reachable?" heuristic
//! - **Auth**: online login with an offline credential-cache fallback
//!
//! ## Design Principles
//!
//! - Local durability first: an event is written through to disk before it
//!   appears in any in-memory view
//! - Only an explicit remote geo-validation verdict terminates an event;
//!   timeouts, connection failures and server errors keep it pending
//! - At-least-once submission: the ledger is idempotent per event id, so
//!   retrying a duplicate-looking submission is always safer than losing
//!   an event to a network blip

pub mod auth;
pub mod config;
pub mod reachability;
pub mod remote;
pub mod store;
pub mod sync;
pub mod types;

// Re-export sync settings
pub use config::SyncSettings;

// Re-export commonly used types
pub use types::{
    CollectionEvent, CollectorCredential, CollectorProfile, EventStatus, GeoPoint, Session,
    Species, StatusFilter,
};

// Re-export storage
pub use store::{EventStore, MemoryEventStore, SledEventStore, StoreError, StoreStats};

// Re-export the remote client
pub use remote::{
    BatchVerdict, LedgerClient, LoginResponse, RemoteError, SubmissionClient, SubmitVerdict,
};

// Re-export reachability
pub use reachability::{ReachabilityHandle, ReachabilityMonitor};

// Re-export the coordinator
pub use sync::{EnqueueOutcome, SyncCoordinator, SyncError, SyncOutcome, SyncStats, SyncTally};

// Re-export auth
pub use auth::{hash_pin, AuthError, AuthService};
