//! Remote ledger communication.
//!
//! The [`SubmissionClient`] trait is the seam between the sync coordinator
//! and the network; [`LedgerClient`] is the reqwest-backed implementation.
//!
//! The one rule that everything here serves: **only an explicit remote
//! geo-validation verdict may terminate an event**. Timeouts, connection
//! failures, non-2xx statuses and malformed bodies all classify as
//! [`RemoteError::Transient`], which leaves the event pending and eligible
//! for retry. The ledger is idempotent per event id, so a retried
//! submission can duplicate nothing.

pub mod client;

pub use client::LedgerClient;

use crate::types::{CollectionEvent, CollectorProfile};
use async_trait::async_trait;
use serde::Deserialize;

/// Remote client errors.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// No definitive verdict: network failure, timeout, server error or an
    /// unparseable response. The event stays pending.
    #[error("transient submission failure: {0}")]
    Transient(String),
    /// The authentication endpoint explicitly refused the credentials.
    /// Unlike a transient failure this is a definitive verdict; the offline
    /// cache must not be consulted.
    #[error("credentials rejected by the remote authority")]
    CredentialsRejected,
    /// This client has no bulk submission path; the coordinator falls back
    /// to sequential submission.
    #[error("bulk submission not supported")]
    BatchUnsupported,
}

/// Per-event verdict from the validation endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SubmitVerdict {
    /// Whether the ledger accepted the submission for validation.
    #[serde(rename = "success")]
    pub accepted: bool,
    /// The geofence verdict: coordinates inside an approved zone for the
    /// species.
    #[serde(rename = "geo_validated")]
    pub geo_valid: bool,
    /// Remote transaction reference, present when the event was committed.
    #[serde(rename = "txId", default)]
    pub tx_id: Option<String>,
}

/// One item of a bulk submission response, keyed by event id.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BatchVerdict {
    #[serde(rename = "id")]
    pub event_id: String,
    #[serde(flatten)]
    pub verdict: SubmitVerdict,
}

/// Response from the authentication endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub collector: CollectorProfile,
}

/// Stateless request/response wrapper around the remote validation
/// endpoint.
///
/// Implementations must be thread-safe; the coordinator and the
/// reachability monitor share one instance.
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    /// Submit one event for validation.
    async fn submit(&self, event: &CollectionEvent) -> Result<SubmitVerdict, RemoteError>;

    /// Bulk submission with identical per-item semantics.
    ///
    /// The default implementation reports no bulk path, which sends the
    /// coordinator down its sequential fallback.
    async fn submit_batch(
        &self,
        events: &[CollectionEvent],
    ) -> Result<Vec<BatchVerdict>, RemoteError> {
        let _ = events;
        Err(RemoteError::BatchUnsupported)
    }

    /// Exchange collector id + PIN for a session token and profile.
    async fn login(&self, collector_id: &str, pin: &str) -> Result<LoginResponse, RemoteError>;

    /// Lightweight reachability probe. Never errors: unreachable is `false`.
    async fn health_check(&self) -> bool;

    /// Attach (or clear) the session token sent with submissions.
    fn set_session_token(&self, token: Option<&str>) {
        let _ = token;
    }
}
