//! The sync coordinator: owns the pending set and drives every status
//! transition.
//!
//! ## State machine per event
//!
//! ```text
//! [pending] --submit, ledger accepts & geo-valid--> [synced]
//! [pending] --submit, ledger accepts & geo-invalid--> [rejected]
//! [pending] --submit, network/timeout/server error--> [pending]
//! [rejected] -- terminal; only user deletion leaves this state
//! [synced]  -- terminal
//! ```
//!
//! All mutations are write-through: the store is updated before the
//! in-memory pending set, so a process kill between the two can only leave
//! an event pending, never lost. A single run lock serializes submission
//! runs; submissions within a run go out sequentially in creation order.

use crate::reachability::ReachabilityHandle;
use crate::remote::{RemoteError, SubmissionClient, SubmitVerdict};
use crate::store::{EventStore, StoreError};
use crate::types::{CollectionEvent, EventStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// What `enqueue` tells its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The inline attempt committed the event immediately.
    Synced { tx_id: String },
    /// The inline attempt got a definitive geo-invalid verdict.
    Rejected,
    /// Durably saved; will sync on a later round. Covers "offline, not
    /// attempted" and "attempted, failed transiently" alike.
    SavedPending,
}

/// Outcome of a single-event submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced { tx_id: String },
    Rejected,
    /// Transient failure; the event stays pending.
    RetryLater,
    /// The event was already terminal. Calling sync on it is a usage
    /// error, reported but not fatal.
    AlreadyTerminal,
}

/// Aggregate tally of one `sync_all` run. Per-item failures land here;
/// `sync_all` itself never raises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncTally {
    pub synced: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl SyncTally {
    pub fn total(&self) -> usize {
        self.synced + self.rejected + self.failed
    }
}

/// Read-only projection for the UI layer, rebuildable from the store at
/// any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub pending: usize,
    pub synced_today: usize,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Errors surfaced by the single-event paths. `sync_all` converts all of
/// these into tally entries instead.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("unknown event id: {0}")]
    UnknownEvent(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

struct StatsInner {
    synced_today: usize,
    day: NaiveDate,
    last_sync: Option<DateTime<Utc>>,
}

/// How one submission settled, after the store caught up.
enum Settled {
    Synced(String),
    Rejected,
    Retry,
}

/// Process-wide sync state for one device.
///
/// Constructed explicitly with its collaborators so tests can substitute
/// fakes for both the store and the client.
pub struct SyncCoordinator {
    store: Arc<dyn EventStore>,
    client: Arc<dyn SubmissionClient>,
    reachability: ReachabilityHandle,
    /// Pending events in creation order. Kept consistent with the store by
    /// construction: every mutation goes through this coordinator, which
    /// writes to the store first.
    pending: RwLock<Vec<CollectionEvent>>,
    /// Serializes submission runs: no two submissions for this device run
    /// concurrently.
    run_lock: Mutex<()>,
    stats: RwLock<StatsInner>,
}

impl SyncCoordinator {
    pub fn new(
        store: Arc<dyn EventStore>,
        client: Arc<dyn SubmissionClient>,
        reachability: ReachabilityHandle,
    ) -> Self {
        info!(backend = store.backend_name(), "Sync coordinator initialized");
        Self {
            store,
            client,
            reachability,
            pending: RwLock::new(Vec::new()),
            run_lock: Mutex::new(()),
            stats: RwLock::new(StatsInner {
                synced_today: 0,
                day: Utc::now().date_naive(),
                last_sync: None,
            }),
        }
    }

    /// Rebuild the pending set from the store, e.g. at app start.
    pub fn load_from_store(&self) -> Result<usize, StoreError> {
        let pending = self.store.load_pending()?;
        let count = pending.len();
        *self.write_pending() = pending;
        if count > 0 {
            info!(pending = count, "Pending set restored from store");
        }
        Ok(count)
    }

    pub fn reachability(&self) -> &ReachabilityHandle {
        &self.reachability
    }

    /// Record a new event: durably saved first, then appended to the
    /// pending set, then submitted once inline if the ledger looks
    /// reachable.
    ///
    /// A [`StoreError`] aborts the whole action; the caller tells the
    /// operator to retry. Remote failure never surfaces as an error here:
    /// the event is already safe locally.
    pub async fn enqueue(&self, event: CollectionEvent) -> Result<EnqueueOutcome, StoreError> {
        self.store.save(&event)?;
        self.write_pending().push(event.clone());
        debug!(id = %event.id, species = %event.species, "Event enqueued");

        if !self.reachability.is_reachable() {
            return Ok(EnqueueOutcome::SavedPending);
        }

        let _guard = self.run_lock.lock().await;
        let settled = self.submit_and_settle(&event).await;
        Ok(match settled {
            Settled::Synced(tx_id) => EnqueueOutcome::Synced { tx_id },
            Settled::Rejected => EnqueueOutcome::Rejected,
            Settled::Retry => EnqueueOutcome::SavedPending,
        })
    }

    /// Submit exactly one pending event.
    ///
    /// Idempotent on terminal events: they are never resubmitted, the call
    /// reports [`SyncOutcome::AlreadyTerminal`] and logs the misuse.
    pub async fn sync_one(&self, id: &str) -> Result<SyncOutcome, SyncError> {
        let event = self
            .store
            .get(id)?
            .ok_or_else(|| SyncError::UnknownEvent(id.to_string()))?;

        if event.status.is_terminal() {
            warn!(id = id, status = %event.status, "sync_one called on a terminal event");
            return Ok(SyncOutcome::AlreadyTerminal);
        }

        let _guard = self.run_lock.lock().await;
        Ok(match self.submit_and_settle(&event).await {
            Settled::Synced(tx_id) => SyncOutcome::Synced { tx_id },
            Settled::Rejected => SyncOutcome::Rejected,
            Settled::Retry => SyncOutcome::RetryLater,
        })
    }

    /// Submit every currently-pending event, sequentially, in creation
    /// order.
    ///
    /// Works on a snapshot: events enqueued while the run is in flight are
    /// picked up by the next round. Never raises; every per-item outcome
    /// lands in the tally.
    pub async fn sync_all(&self) -> SyncTally {
        let _guard = self.run_lock.lock().await;

        let mut snapshot: Vec<CollectionEvent> = {
            let pending = self.read_pending();
            pending.iter().filter(|e| e.is_pending()).cloned().collect()
        };
        snapshot.sort_by_key(|e| e.recorded_at);

        let mut tally = SyncTally::default();
        if snapshot.is_empty() {
            return tally;
        }

        info!(pending = snapshot.len(), "Sync round started");

        let settled_batch = if snapshot.len() > 1 {
            self.try_batch(&snapshot, &mut tally).await
        } else {
            false
        };

        if !settled_batch {
            for event in &snapshot {
                match self.submit_and_settle(event).await {
                    Settled::Synced(_) => tally.synced += 1,
                    Settled::Rejected => tally.rejected += 1,
                    Settled::Retry => tally.failed += 1,
                }
            }
        }

        {
            let mut stats = self.write_stats();
            stats.last_sync = Some(Utc::now());
        }

        info!(
            synced = tally.synced,
            rejected = tally.rejected,
            failed = tally.failed,
            "Sync round finished"
        );
        tally
    }

    /// Opportunistic bulk path. Returns `true` when the batch settled the
    /// snapshot (even if some items failed); `false` sends the caller to
    /// the sequential fallback.
    async fn try_batch(&self, snapshot: &[CollectionEvent], tally: &mut SyncTally) -> bool {
        match self.client.submit_batch(snapshot).await {
            Ok(verdicts) => {
                let by_id: HashMap<&str, &SubmitVerdict> = verdicts
                    .iter()
                    .map(|v| (v.event_id.as_str(), &v.verdict))
                    .collect();

                for event in snapshot {
                    match by_id.get(event.id.as_str()) {
                        Some(verdict) => match self.apply_verdict(event, verdict) {
                            Settled::Synced(_) => tally.synced += 1,
                            Settled::Rejected => tally.rejected += 1,
                            Settled::Retry => tally.failed += 1,
                        },
                        None => {
                            // No verdict for this item: ambiguity keeps it
                            // pending.
                            warn!(id = %event.id, "Batch response missing verdict, keeping pending");
                            tally.failed += 1;
                        }
                    }
                }
                true
            }
            Err(RemoteError::BatchUnsupported) => {
                debug!("No bulk path, falling back to sequential submission");
                false
            }
            Err(e) => {
                warn!(error = %e, pending = snapshot.len(), "Batch submission failed, will retry");
                tally.failed += snapshot.len();
                true
            }
        }
    }

    /// Submit one event and settle the outcome into store + pending set.
    async fn submit_and_settle(&self, event: &CollectionEvent) -> Settled {
        match self.client.submit(event).await {
            Ok(verdict) => self.apply_verdict(event, &verdict),
            Err(RemoteError::BatchUnsupported) => {
                // A single submit should never report this; treat it as
                // having produced no verdict.
                warn!(id = %event.id, "Client returned BatchUnsupported for a single submit");
                Settled::Retry
            }
            Err(e) => {
                debug!(id = %event.id, error = %e, "Submission failed, event stays pending");
                Settled::Retry
            }
        }
    }

    /// Map a ledger verdict onto the state machine. Only a complete,
    /// explicit verdict terminates the event; anything ambiguous keeps it
    /// pending.
    fn apply_verdict(&self, event: &CollectionEvent, verdict: &SubmitVerdict) -> Settled {
        if verdict.accepted && verdict.geo_valid {
            let Some(tx_id) = verdict.tx_id.as_deref() else {
                warn!(id = %event.id, "Accepted verdict missing tx reference, keeping pending");
                return Settled::Retry;
            };

            match self
                .store
                .update_status(&event.id, EventStatus::Synced, Some(tx_id))
            {
                Ok(true) => {}
                Ok(false) => {
                    warn!(id = %event.id, "Status update hit an unknown id");
                }
                Err(e) => {
                    // The ledger committed but the local write failed. The
                    // event stays pending and the idempotent ledger absorbs
                    // the retry.
                    error!(id = %event.id, error = %e, "Local store update failed after commit");
                    return Settled::Retry;
                }
            }
            self.remove_pending(&event.id);
            self.bump_synced_today();
            info!(id = %event.id, tx_id = tx_id, "Event committed to ledger");
            Settled::Synced(tx_id.to_string())
        } else if verdict.accepted {
            match self
                .store
                .update_status(&event.id, EventStatus::Rejected, None)
            {
                Ok(true) => {}
                Ok(false) => {
                    warn!(id = %event.id, "Status update hit an unknown id");
                }
                Err(e) => {
                    error!(id = %event.id, error = %e, "Local store update failed for rejection");
                    return Settled::Retry;
                }
            }
            self.remove_pending(&event.id);
            warn!(
                id = %event.id,
                species = %event.species,
                lat = event.location.lat,
                lon = event.location.lon,
                "Ledger rejected event: outside approved zones"
            );
            Settled::Rejected
        } else {
            // `accepted == false` carries no geofence verdict; the event
            // may or may not have reached validation. Keep it pending.
            warn!(id = %event.id, "Ledger did not accept event, keeping pending");
            Settled::Retry
        }
    }

    /// Remove an event permanently, any status. Idempotent.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete(id)?;
        self.remove_pending(id);
        debug!(id = id, "Event deleted");
        Ok(())
    }

    /// Destructive reset: both store tables and the in-memory state.
    /// Explicit user action only.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.store.clear_all()?;
        self.write_pending().clear();
        let mut stats = self.write_stats();
        stats.synced_today = 0;
        stats.last_sync = None;
        Ok(())
    }

    /// Snapshot of the pending set in creation order.
    pub fn pending_snapshot(&self) -> Vec<CollectionEvent> {
        let mut snapshot = self.read_pending().clone();
        snapshot.sort_by_key(|e| e.recorded_at);
        snapshot
    }

    /// UI-facing counters, recomputed from in-memory state.
    pub fn stats(&self) -> SyncStats {
        let pending = self.read_pending().len();
        let stats = self.stats.read().unwrap_or_else(|e| e.into_inner());
        let today = Utc::now().date_naive();
        SyncStats {
            pending,
            synced_today: if stats.day == today {
                stats.synced_today
            } else {
                0
            },
            last_sync: stats.last_sync,
        }
    }

    /// Reset the synced-today counter, e.g. from a settings action.
    pub fn reset_daily_counter(&self) {
        let mut stats = self.write_stats();
        stats.synced_today = 0;
        stats.day = Utc::now().date_naive();
    }

    fn bump_synced_today(&self) {
        let mut stats = self.write_stats();
        let today = Utc::now().date_naive();
        if stats.day != today {
            stats.day = today;
            stats.synced_today = 0;
        }
        stats.synced_today += 1;
    }

    fn remove_pending(&self, id: &str) {
        self.write_pending().retain(|e| e.id != id);
    }

    fn read_pending(&self) -> std::sync::RwLockReadGuard<'_, Vec<CollectionEvent>> {
        self.pending.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_pending(&self) -> std::sync::RwLockWriteGuard<'_, Vec<CollectionEvent>> {
        self.pending.write().unwrap_or_else(|e| e.into_inner())
    }

    fn write_stats(&self) -> std::sync::RwLockWriteGuard<'_, StatsInner> {
        self.stats.write().unwrap_or_else(|e| e.into_inner())
    }
}
