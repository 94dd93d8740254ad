//! Collector authentication with an offline credential-cache fallback.
//!
//! Online login is always tried first; a success refreshes the local
//! credential cache. Only a *transient* failure falls back to the cache;
//! an explicit rejection from the authority is final and never consults
//! local state. Offline sessions carry no token: the collector can record
//! and enqueue, but nothing reaches the ledger until connectivity returns.

use crate::config::defaults::CREDENTIAL_TTL_DAYS;
use crate::remote::{RemoteError, SubmissionClient};
use crate::store::{EventStore, StoreError};
use crate::types::{CollectorCredential, CollectorProfile, Session};
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};

/// Authentication errors. Each maps to an actionable message for the
/// operator.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The remote authority explicitly refused the credentials.
    #[error("collector id or PIN is incorrect")]
    InvalidCredentials,
    /// Unreachable authority and no usable cache entry: wrong PIN, never
    /// logged in on this device, or the cached entry has expired.
    #[error("cannot verify credentials offline")]
    OfflineCacheMiss,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One-way digest of a collector PIN. The PIN itself never touches disk.
pub fn hash_pin(pin: &str) -> String {
    let digest = Sha256::digest(pin.as_bytes());
    hex::encode(digest)
}

/// Login flow over a submission client and the credential cache.
pub struct AuthService {
    store: Arc<dyn EventStore>,
    client: Arc<dyn SubmissionClient>,
    credential_ttl: Duration,
}

impl AuthService {
    pub fn new(store: Arc<dyn EventStore>, client: Arc<dyn SubmissionClient>) -> Self {
        Self::with_credential_ttl(store, client, Duration::days(CREDENTIAL_TTL_DAYS))
    }

    pub fn with_credential_ttl(
        store: Arc<dyn EventStore>,
        client: Arc<dyn SubmissionClient>,
        credential_ttl: Duration,
    ) -> Self {
        Self {
            store,
            client,
            credential_ttl,
        }
    }

    /// Authenticate a collector, online when possible, from the cache when
    /// not.
    pub async fn login(&self, collector_id: &str, pin: &str) -> Result<Session, AuthError> {
        match self.client.login(collector_id, pin).await {
            Ok(response) => {
                self.refresh_cache(&response.collector, pin);
                info!(collector_id = %response.collector.id, "Collector logged in online");
                Ok(Session {
                    profile: response.collector,
                    token: Some(response.token),
                })
            }
            Err(RemoteError::CredentialsRejected) => Err(AuthError::InvalidCredentials),
            Err(e) => {
                warn!(error = %e, "Auth endpoint unreachable, trying credential cache");
                self.offline_login(collector_id, pin)
            }
        }
    }

    fn offline_login(&self, collector_id: &str, pin: &str) -> Result<Session, AuthError> {
        let Some(credential) = self
            .store
            .lookup_credential(collector_id, &hash_pin(pin))?
        else {
            return Err(AuthError::OfflineCacheMiss);
        };

        let age = Utc::now() - credential.last_login;
        if age > self.credential_ttl {
            warn!(
                collector_id = collector_id,
                age_days = age.num_days(),
                "Cached credential expired, refusing offline login"
            );
            return Err(AuthError::OfflineCacheMiss);
        }

        info!(collector_id = collector_id, "Collector logged in offline");
        Ok(Session {
            profile: CollectorProfile {
                id: credential.collector_id,
                name: credential.name,
                region: credential.region,
            },
            token: None,
        })
    }

    /// Overwrite the cached credential after a successful online login.
    /// A cache write failure downgrades future offline logins but must not
    /// fail the login that just succeeded.
    fn refresh_cache(&self, profile: &CollectorProfile, pin: &str) {
        let credential = CollectorCredential {
            collector_id: profile.id.clone(),
            pin_hash: hash_pin(pin),
            name: profile.name.clone(),
            region: profile.region.clone(),
            last_login: Utc::now(),
        };
        if let Err(e) = self.store.cache_credential(&credential) {
            warn!(collector_id = %profile.id, error = %e, "Failed to refresh credential cache");
        }
    }
}
