//! System-wide default constants.
//!
//! Centralises magic numbers so every timeout, interval and cap is tunable
//! from one place. Grouped by subsystem for easy discovery.

// ============================================================================
// Remote Submission Client
// ============================================================================

/// HTTP client timeout for ledger submission requests (seconds).
pub const SUBMIT_TIMEOUT_SECS: u64 = 30;

/// Timeout for the lightweight health probe (seconds).
///
/// Much shorter than the submission timeout: a probe that takes longer than
/// this is as good as offline for scheduling purposes.
pub const HEALTH_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Reachability Monitor
// ============================================================================

/// Foreground polling interval for the reachability monitor (seconds).
pub const REACHABILITY_POLL_INTERVAL_SECS: u64 = 10;

// ============================================================================
// Auto Sync
// ============================================================================

/// Base interval between background sync rounds (seconds).
pub const AUTO_SYNC_INTERVAL_SECS: u64 = 60;

/// Random jitter added to the auto-sync interval (seconds).
pub const AUTO_SYNC_JITTER_SECS: u64 = 5;

/// Maximum backoff multiplier exponent after consecutive failed rounds.
///
/// `2^6 = 64× base interval`, capped at [`AUTO_SYNC_BACKOFF_CAP_SECS`].
pub const AUTO_SYNC_MAX_BACKOFF_EXPONENT: u32 = 6;

/// Hard cap on the backed-off auto-sync delay (seconds).
pub const AUTO_SYNC_BACKOFF_CAP_SECS: u64 = 300;

// ============================================================================
// Event Store
// ============================================================================

/// Maximum rows returned by a history query.
///
/// Protects callers from unbounded memory growth on devices with a long
/// collection history. The pending-set rebuild path is exempt.
pub const HISTORY_PAGE_CAP: usize = 100;

/// Default quantity unit when the operator does not pick one.
pub const DEFAULT_UNIT: &str = "kg";

// ============================================================================
// Credential Cache
// ============================================================================

/// Maximum age of a cached credential for offline login (days).
///
/// A cache entry older than this behaves as "not found"; the collector must
/// log in online again before working offline.
pub const CREDENTIAL_TTL_DAYS: i64 = 30;
