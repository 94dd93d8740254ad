//! Background sync task: periodically drains the pending set to the
//! ledger.
//!
//! Runs a jittered interval loop: skip the round when the ledger looks
//! unreachable or nothing is pending, otherwise invoke a full sync round.
//! Rounds where every submission fails back off exponentially (capped) so
//! a dead uplink is not hammered at full cadence.

use super::SyncCoordinator;
use crate::config::defaults::{AUTO_SYNC_BACKOFF_CAP_SECS, AUTO_SYNC_MAX_BACKOFF_EXPONENT};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Run the auto-sync loop until cancelled.
pub async fn run_auto_sync(
    coordinator: Arc<SyncCoordinator>,
    cancel: CancellationToken,
    interval_secs: u64,
    jitter_secs: u64,
) {
    let mut consecutive_failures: u32 = 0;

    loop {
        let jitter = if jitter_secs > 0 {
            use rand::Rng;
            rand::thread_rng().gen_range(0..jitter_secs)
        } else {
            0
        };

        let backoff = 1u64 << consecutive_failures.min(AUTO_SYNC_MAX_BACKOFF_EXPONENT);
        let delay_secs = (interval_secs.saturating_mul(backoff)).min(AUTO_SYNC_BACKOFF_CAP_SECS);

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Auto-sync task stopped");
                break;
            }
            _ = tokio::time::sleep(Duration::from_secs(delay_secs + jitter)) => {}
        }

        if !coordinator.reachability().is_reachable() {
            debug!("Auto-sync skipped: ledger unreachable");
            continue;
        }

        let pending = coordinator.stats().pending;
        if pending == 0 {
            debug!("Auto-sync skipped: nothing pending");
            continue;
        }

        let tally = coordinator.sync_all().await;

        if tally.synced + tally.rejected == 0 && tally.failed > 0 {
            consecutive_failures = consecutive_failures.saturating_add(1);
            warn!(
                failed = tally.failed,
                consecutive_failures,
                "Auto-sync round made no progress, backing off"
            );
        } else {
            consecutive_failures = 0;
            info!(
                synced = tally.synced,
                rejected = tally.rejected,
                failed = tally.failed,
                "Auto-sync round complete"
            );
        }
    }
}
