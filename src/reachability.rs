//! Network reachability monitor.
//!
//! Answers "is a remote path currently plausible?" by polling the ledger's
//! health endpoint. This is a heuristic used to skip futile submission
//! attempts, not a correctness dependency: the coordinator still handles
//! submission failure when the monitor says reachable, and a manual sync
//! still works when it says offline.

use crate::remote::SubmissionClient;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct Inner {
    reachable: AtomicBool,
    last_checked: RwLock<Option<DateTime<Utc>>>,
}

/// Cheap cloneable view of the monitor's current belief.
#[derive(Clone)]
pub struct ReachabilityHandle {
    inner: Arc<Inner>,
}

impl ReachabilityHandle {
    /// Current belief. `false` until the first probe completes.
    pub fn is_reachable(&self) -> bool {
        self.inner.reachable.load(Ordering::Relaxed)
    }

    /// When the last probe ran, if any.
    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        *self
            .inner
            .last_checked
            .read()
            .unwrap_or_else(|e| e.into_inner())
    }
}

/// Polls the ledger health endpoint on a fixed interval and on demand.
pub struct ReachabilityMonitor {
    client: Arc<dyn SubmissionClient>,
    inner: Arc<Inner>,
    poll_interval: Duration,
}

impl ReachabilityMonitor {
    pub fn new(client: Arc<dyn SubmissionClient>, poll_interval: Duration) -> Self {
        Self {
            client,
            inner: Arc::new(Inner {
                reachable: AtomicBool::new(false),
                last_checked: RwLock::new(None),
            }),
            poll_interval,
        }
    }

    /// Handle for consumers (the coordinator, the UI status badge).
    pub fn handle(&self) -> ReachabilityHandle {
        ReachabilityHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    /// On-demand probe, used before a manual sync action.
    pub async fn probe(&self) -> bool {
        let reachable = self.client.health_check().await;

        let was = self.inner.reachable.swap(reachable, Ordering::Relaxed);
        {
            let mut guard = self
                .inner
                .last_checked
                .write()
                .unwrap_or_else(|e| e.into_inner());
            *guard = Some(Utc::now());
        }

        if was != reachable {
            if reachable {
                info!("Ledger reachable, pending events eligible for sync");
            } else {
                info!("Ledger unreachable, recording continues offline");
            }
        } else {
            debug!(reachable, "Reachability probe");
        }

        reachable
    }

    /// Run the foreground polling loop until cancelled.
    ///
    /// No retry or backoff of its own; a failed probe just reports
    /// unreachable and the next tick tries again.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Reachability monitor stopped");
                    break;
                }
                _ = interval.tick() => {
                    self.probe().await;
                }
            }
        }
    }
}
