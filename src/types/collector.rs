//! Collector identity types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cached identity proof for offline login.
///
/// At most one cached credential exists per collector id; each successful
/// online login overwrites it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectorCredential {
    pub collector_id: String,
    /// SHA-256 hex digest of the collector's PIN. The PIN itself is never
    /// stored.
    pub pin_hash: String,
    pub name: String,
    pub region: String,
    /// Last successful online login; offline login refuses entries older
    /// than the configured TTL.
    pub last_login: DateTime<Utc>,
}

/// Collector profile as returned by the authentication endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectorProfile {
    pub id: String,
    pub name: String,
    pub region: String,
}

/// An authenticated session on this device.
///
/// Offline sessions carry no token: they can record and enqueue events,
/// but nothing submits successfully until reachability returns and the
/// collector is re-authenticated by the ledger itself.
#[derive(Debug, Clone)]
pub struct Session {
    pub profile: CollectorProfile,
    pub token: Option<String>,
}

impl Session {
    /// Whether this session was established from the local credential
    /// cache rather than the remote authority.
    pub fn is_offline(&self) -> bool {
        self.token.is_none()
    }
}
