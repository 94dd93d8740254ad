//! Sync engine integration tests.
//!
//! Exercise the coordinator end-to-end against the in-memory store and a
//! scripted mock ledger: durability-first enqueue, transient-vs-rejection
//! classification, terminal-state immutability, ordering, and the bulk
//! fallback path.

use async_trait::async_trait;
use herblock_field::reachability::ReachabilityMonitor;
use herblock_field::remote::{
    BatchVerdict, LoginResponse, RemoteError, SubmissionClient, SubmitVerdict,
};
use herblock_field::store::{EventStore, MemoryEventStore, StoreError};
use herblock_field::sync::{EnqueueOutcome, SyncCoordinator, SyncOutcome, SyncTally};
use herblock_field::types::{CollectionEvent, EventStatus, GeoPoint, Species, StatusFilter};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted ledger double. Per-id geo rejections, a global transient
/// switch, an optional bulk path, and a record of submission order.
#[derive(Default)]
struct MockLedger {
    /// When set, every submission fails with no verdict.
    transient: AtomicBool,
    /// Event ids that get an explicit geo-invalid verdict.
    reject_geo: Mutex<HashSet<String>>,
    /// Event ids silently dropped from bulk responses.
    batch_omit: Mutex<HashSet<String>>,
    /// Whether the bulk endpoint exists.
    batch_enabled: AtomicBool,
    healthy: AtomicBool,
    /// Submitted event ids, in call order.
    calls: Mutex<Vec<String>>,
    tx_counter: AtomicUsize,
}

impl MockLedger {
    fn verdict_for(&self, event: &CollectionEvent) -> SubmitVerdict {
        let rejected = self
            .reject_geo
            .lock()
            .unwrap()
            .contains(event.id.as_str());
        if rejected {
            SubmitVerdict {
                accepted: true,
                geo_valid: false,
                tx_id: None,
            }
        } else {
            let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
            SubmitVerdict {
                accepted: true,
                geo_valid: true,
                tx_id: Some(format!("tx-{:03}", n)),
            }
        }
    }

    fn submitted_ids(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubmissionClient for MockLedger {
    async fn submit(&self, event: &CollectionEvent) -> Result<SubmitVerdict, RemoteError> {
        self.calls.lock().unwrap().push(event.id.clone());
        if self.transient.load(Ordering::SeqCst) {
            return Err(RemoteError::Transient("connection refused".to_string()));
        }
        Ok(self.verdict_for(event))
    }

    async fn submit_batch(
        &self,
        events: &[CollectionEvent],
    ) -> Result<Vec<BatchVerdict>, RemoteError> {
        if !self.batch_enabled.load(Ordering::SeqCst) {
            return Err(RemoteError::BatchUnsupported);
        }
        if self.transient.load(Ordering::SeqCst) {
            return Err(RemoteError::Transient("connection refused".to_string()));
        }
        let omit = self.batch_omit.lock().unwrap().clone();
        let mut verdicts = Vec::new();
        for event in events {
            self.calls.lock().unwrap().push(event.id.clone());
            if omit.contains(event.id.as_str()) {
                continue;
            }
            verdicts.push(BatchVerdict {
                event_id: event.id.clone(),
                verdict: self.verdict_for(event),
            });
        }
        Ok(verdicts)
    }

    async fn login(&self, _: &str, _: &str) -> Result<LoginResponse, RemoteError> {
        Err(RemoteError::Transient("not under test".to_string()))
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

struct Rig {
    coordinator: SyncCoordinator,
    ledger: Arc<MockLedger>,
    store: Arc<MemoryEventStore>,
}

/// Build a coordinator over fresh fakes. `online` also runs one probe so
/// the reachability handle reflects it.
async fn rig(online: bool) -> Rig {
    let ledger = Arc::new(MockLedger::default());
    ledger.healthy.store(online, Ordering::SeqCst);

    let store = Arc::new(MemoryEventStore::new());
    let monitor = ReachabilityMonitor::new(
        Arc::clone(&ledger) as Arc<dyn SubmissionClient>,
        Duration::from_secs(10),
    );
    monitor.probe().await;

    let coordinator = SyncCoordinator::new(
        Arc::clone(&store) as Arc<dyn EventStore>,
        Arc::clone(&ledger) as Arc<dyn SubmissionClient>,
        monitor.handle(),
    );
    Rig {
        coordinator,
        ledger,
        store,
    }
}

fn ashwagandha_event() -> CollectionEvent {
    CollectionEvent::new(
        Species::Ashwagandha,
        GeoPoint::new(22.5, 75.8),
        "COLL-001",
        2.5,
        None,
        None,
    )
}

#[tokio::test]
async fn enqueue_offline_saves_pending_and_skips_submission() {
    let rig = rig(false).await;
    let event = ashwagandha_event();
    let id = event.id.clone();

    let outcome = rig.coordinator.enqueue(event).await.unwrap();
    assert_eq!(outcome, EnqueueOutcome::SavedPending);

    // Never lost: present in the store with status pending, exactly once.
    let stored = rig.store.get(&id).unwrap().unwrap();
    assert_eq!(stored.status, EventStatus::Pending);
    assert_eq!(rig.store.stats().unwrap().total, 1);

    // No futile submission attempt while unreachable.
    assert!(rig.ledger.submitted_ids().is_empty());
    assert_eq!(rig.coordinator.pending_snapshot().len(), 1);
}

#[tokio::test]
async fn enqueue_online_commits_inline() {
    // Ashwagandha at (22.5, 75.8), 2.5 kg; the ledger accepts with tx-001.
    let rig = rig(true).await;
    let event = ashwagandha_event();
    let id = event.id.clone();

    let outcome = rig.coordinator.enqueue(event).await.unwrap();
    assert_eq!(
        outcome,
        EnqueueOutcome::Synced {
            tx_id: "tx-001".to_string()
        }
    );

    let stored = rig.store.get(&id).unwrap().unwrap();
    assert_eq!(stored.status, EventStatus::Synced);
    assert_eq!(stored.tx_id.as_deref(), Some("tx-001"));
    assert!(stored.synced_at.is_some());
    assert!(rig.coordinator.pending_snapshot().is_empty());
    assert_eq!(rig.coordinator.stats().synced_today, 1);
}

#[tokio::test]
async fn enqueue_during_transient_outage_stays_pending() {
    let rig = rig(true).await;
    rig.ledger.transient.store(true, Ordering::SeqCst);

    let event = ashwagandha_event();
    let id = event.id.clone();

    // The inline attempt runs (monitor believes reachable) and fails, but
    // the caller only sees "saved".
    let outcome = rig.coordinator.enqueue(event).await.unwrap();
    assert_eq!(outcome, EnqueueOutcome::SavedPending);
    assert_eq!(rig.ledger.submitted_ids().len(), 1);
    assert_eq!(
        rig.store.get(&id).unwrap().unwrap().status,
        EventStatus::Pending
    );
}

#[tokio::test]
async fn duplicate_id_never_stored_twice() {
    let rig = rig(false).await;
    let event = ashwagandha_event();

    rig.coordinator.enqueue(event.clone()).await.unwrap();
    let err = rig.coordinator.enqueue(event).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateId(_)));
    assert_eq!(rig.store.stats().unwrap().total, 1);
}

#[tokio::test]
async fn transient_failures_leave_everything_pending() {
    let rig = rig(false).await;
    for _ in 0..3 {
        rig.coordinator.enqueue(ashwagandha_event()).await.unwrap();
    }
    rig.ledger.transient.store(true, Ordering::SeqCst);

    // Repeated rounds: nothing changes, failed == pending-set size each
    // time.
    for _ in 0..2 {
        let tally = rig.coordinator.sync_all().await;
        assert_eq!(
            tally,
            SyncTally {
                synced: 0,
                rejected: 0,
                failed: 3
            }
        );
        assert_eq!(rig.store.stats().unwrap().pending, 3);
        assert_eq!(rig.coordinator.pending_snapshot().len(), 3);
    }
}

#[tokio::test]
async fn rejection_is_sticky_and_skipped_afterwards() {
    let rig = rig(false).await;

    let keep = ashwagandha_event();
    let reject = CollectionEvent::new(
        Species::Tulsi,
        GeoPoint::new(48.8, 2.3), // far outside any approved zone
        "COLL-001",
        1.0,
        None,
        None,
    );
    let reject_id = reject.id.clone();
    rig.ledger
        .reject_geo
        .lock()
        .unwrap()
        .insert(reject_id.clone());

    rig.coordinator.enqueue(keep.clone()).await.unwrap();
    rig.coordinator.enqueue(reject).await.unwrap();

    let outcome = rig.coordinator.sync_one(&reject_id).await.unwrap();
    assert_eq!(outcome, SyncOutcome::Rejected);
    let stored = rig.store.get(&reject_id).unwrap().unwrap();
    assert_eq!(stored.status, EventStatus::Rejected);
    assert!(stored.tx_id.is_none());

    // The next full round only touches the surviving pending event.
    let tally = rig.coordinator.sync_all().await;
    assert_eq!(
        tally,
        SyncTally {
            synced: 1,
            rejected: 0,
            failed: 0
        }
    );
    assert_eq!(rig.ledger.submitted_ids().len(), 2); // reject once, keep once

    // Rejected stays rejected; a direct retry is a reported no-op.
    let retry = rig.coordinator.sync_one(&reject_id).await.unwrap();
    assert_eq!(retry, SyncOutcome::AlreadyTerminal);
    assert_eq!(
        rig.store.get(&reject_id).unwrap().unwrap().status,
        EventStatus::Rejected
    );
}

#[tokio::test]
async fn terminal_state_is_immutable() {
    let rig = rig(false).await;
    let event = ashwagandha_event();
    let id = event.id.clone();
    rig.coordinator.enqueue(event).await.unwrap();

    assert_eq!(
        rig.coordinator.sync_one(&id).await.unwrap(),
        SyncOutcome::Synced {
            tx_id: "tx-001".to_string()
        }
    );

    // Neither path resubmits or rewrites a synced event.
    assert_eq!(
        rig.coordinator.sync_one(&id).await.unwrap(),
        SyncOutcome::AlreadyTerminal
    );
    assert_eq!(rig.coordinator.sync_all().await, SyncTally::default());

    let stored = rig.store.get(&id).unwrap().unwrap();
    assert_eq!(stored.status, EventStatus::Synced);
    assert_eq!(stored.tx_id.as_deref(), Some("tx-001"));
    assert_eq!(rig.ledger.submitted_ids().len(), 1);
}

#[tokio::test]
async fn sync_one_unknown_id_is_an_error() {
    let rig = rig(false).await;
    let err = rig.coordinator.sync_one("COL-ghost").await.unwrap_err();
    assert!(matches!(
        err,
        herblock_field::sync::SyncError::UnknownEvent(_)
    ));
}

#[tokio::test]
async fn submission_order_follows_creation_order() {
    let rig = rig(false).await;
    let base = chrono::Utc::now();

    let mut ids = Vec::new();
    for i in 0..3 {
        let mut event = ashwagandha_event();
        event.recorded_at = base + chrono::Duration::seconds(i);
        ids.push(event.id.clone());
        rig.coordinator.enqueue(event).await.unwrap();
    }

    let tally = rig.coordinator.sync_all().await;
    assert_eq!(tally.synced, 3);
    assert_eq!(rig.ledger.submitted_ids(), ids);
}

#[tokio::test]
async fn rejected_event_then_clear_all_leaves_no_pending() {
    let rig = rig(false).await;
    let event = ashwagandha_event();
    let id = event.id.clone();
    rig.ledger.reject_geo.lock().unwrap().insert(id.clone());

    rig.coordinator.enqueue(event).await.unwrap();
    assert_eq!(
        rig.coordinator.sync_one(&id).await.unwrap(),
        SyncOutcome::Rejected
    );

    rig.coordinator.clear_all().unwrap();
    assert!(rig
        .store
        .list_by_status(StatusFilter::Pending)
        .unwrap()
        .is_empty());
    assert!(rig.coordinator.pending_snapshot().is_empty());
    assert_eq!(rig.coordinator.stats().synced_today, 0);
}

#[tokio::test]
async fn bulk_path_applies_per_item_semantics() {
    let rig = rig(false).await;
    rig.ledger.batch_enabled.store(true, Ordering::SeqCst);

    let ok = ashwagandha_event();
    let rejected = ashwagandha_event();
    let dropped = ashwagandha_event();
    rig.ledger
        .reject_geo
        .lock()
        .unwrap()
        .insert(rejected.id.clone());
    rig.ledger
        .batch_omit
        .lock()
        .unwrap()
        .insert(dropped.id.clone());

    for event in [ok.clone(), rejected.clone(), dropped.clone()] {
        rig.coordinator.enqueue(event).await.unwrap();
    }

    let tally = rig.coordinator.sync_all().await;
    assert_eq!(
        tally,
        SyncTally {
            synced: 1,
            rejected: 1,
            failed: 1
        }
    );

    assert_eq!(
        rig.store.get(&ok.id).unwrap().unwrap().status,
        EventStatus::Synced
    );
    assert_eq!(
        rig.store.get(&rejected.id).unwrap().unwrap().status,
        EventStatus::Rejected
    );
    // A verdict the ledger never gave cannot terminate an event.
    assert_eq!(
        rig.store.get(&dropped.id).unwrap().unwrap().status,
        EventStatus::Pending
    );
}

#[tokio::test]
async fn bulk_transient_failure_keeps_the_whole_round_pending() {
    let rig = rig(false).await;
    rig.ledger.batch_enabled.store(true, Ordering::SeqCst);

    for _ in 0..2 {
        rig.coordinator.enqueue(ashwagandha_event()).await.unwrap();
    }
    rig.ledger.transient.store(true, Ordering::SeqCst);

    let tally = rig.coordinator.sync_all().await;
    assert_eq!(
        tally,
        SyncTally {
            synced: 0,
            rejected: 0,
            failed: 2
        }
    );
    assert_eq!(rig.store.stats().unwrap().pending, 2);
}

#[tokio::test]
async fn pending_set_survives_a_coordinator_restart() {
    let rig = rig(false).await;
    for _ in 0..2 {
        rig.coordinator.enqueue(ashwagandha_event()).await.unwrap();
    }

    // New coordinator over the same store, as after an app restart.
    let monitor = ReachabilityMonitor::new(
        Arc::clone(&rig.ledger) as Arc<dyn SubmissionClient>,
        Duration::from_secs(10),
    );
    let restarted = SyncCoordinator::new(
        Arc::clone(&rig.store) as Arc<dyn EventStore>,
        Arc::clone(&rig.ledger) as Arc<dyn SubmissionClient>,
        monitor.handle(),
    );

    assert_eq!(restarted.load_from_store().unwrap(), 2);
    let tally = restarted.sync_all().await;
    assert_eq!(tally.synced, 2);
    assert_eq!(rig.store.stats().unwrap().synced, 2);
}

#[tokio::test]
async fn delete_removes_any_status_and_is_idempotent() {
    let rig = rig(false).await;
    let event = ashwagandha_event();
    let id = event.id.clone();
    rig.coordinator.enqueue(event).await.unwrap();

    rig.coordinator.delete(&id).unwrap();
    rig.coordinator.delete(&id).unwrap();
    assert!(rig.store.get(&id).unwrap().is_none());
    assert!(rig.coordinator.pending_snapshot().is_empty());
}

#[tokio::test]
async fn stats_reflect_sync_activity() {
    let rig = rig(false).await;
    rig.coordinator.enqueue(ashwagandha_event()).await.unwrap();
    rig.coordinator.enqueue(ashwagandha_event()).await.unwrap();

    let before = rig.coordinator.stats();
    assert_eq!(before.pending, 2);
    assert_eq!(before.synced_today, 0);
    assert!(before.last_sync.is_none());

    rig.coordinator.sync_all().await;

    let after = rig.coordinator.stats();
    assert_eq!(after.pending, 0);
    assert_eq!(after.synced_today, 2);
    assert!(after.last_sync.is_some());

    rig.coordinator.reset_daily_counter();
    assert_eq!(rig.coordinator.stats().synced_today, 0);
}
