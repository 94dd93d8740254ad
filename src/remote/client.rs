//! HTTP client for the HerbLock ledger API.

use super::{BatchVerdict, LoginResponse, RemoteError, SubmissionClient, SubmitVerdict};
use crate::config::SyncSettings;
use crate::types::CollectionEvent;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

/// Reqwest-backed [`SubmissionClient`].
///
/// The session token is interior-mutable so the auth flow can attach it
/// after login without re-wiring the coordinator.
#[derive(Clone)]
pub struct LedgerClient {
    http: reqwest::Client,
    base_url: String,
    health_timeout: Duration,
    token: Arc<RwLock<Option<String>>>,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    results: Vec<BatchVerdict>,
}

#[derive(Debug, Deserialize)]
struct ZonesResponse {
    #[serde(default)]
    zones: Vec<String>,
}

/// Classify a reqwest transport error. Everything is transient: the remote
/// gave no verdict.
fn transport_error(e: &reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Transient("request timed out".to_string())
    } else if e.is_connect() {
        RemoteError::Transient(format!("connection failed: {}", e))
    } else {
        RemoteError::Transient(e.to_string())
    }
}

impl LedgerClient {
    /// Create a new client from the engine settings.
    pub fn new(settings: &SyncSettings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.submit_timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            health_timeout: Duration::from_secs(settings.health_timeout_secs),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Base URL for logging.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn bearer(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.bearer() {
            Some(token) => req.header("Authorization", format!("Bearer {}", token)),
            None => req,
        }
    }

    fn event_body(event: &CollectionEvent) -> serde_json::Value {
        serde_json::json!({
            "id": event.id,
            "product_id": event.product_id,
            "species": event.species,
            "scientific_name": event.scientific_name,
            "gps": {
                "lat": event.location.lat,
                "lon": event.location.lon,
                "accuracy": event.location.accuracy_m,
            },
            "collector_id": event.collector_id,
            "quantity": event.quantity,
            "unit": event.unit,
            "notes": event.notes,
            "timestamp": event.recorded_at.to_rfc3339(),
        })
    }

    /// Approved collection zone names for a species, for operator display.
    /// The authoritative geofence check stays on the ledger.
    pub async fn approved_zones(&self, species: &str) -> Result<Vec<String>, RemoteError> {
        let resp = self
            .authorized(self.http.get(format!("{}/zones/{}", self.base_url, species)))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        if !resp.status().is_success() {
            return Err(RemoteError::Transient(format!(
                "server returned {}",
                resp.status()
            )));
        }

        let zones: ZonesResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::Transient(format!("malformed zones response: {}", e)))?;
        Ok(zones.zones)
    }
}

#[async_trait]
impl SubmissionClient for LedgerClient {
    async fn submit(&self, event: &CollectionEvent) -> Result<SubmitVerdict, RemoteError> {
        let resp = self
            .authorized(
                self.http
                    .post(format!("{}/blockchain/collection", self.base_url)),
            )
            .json(&Self::event_body(event))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = resp.status();
        if !status.is_success() {
            // Non-2xx is never a rejection: the geofence verdict only
            // arrives in a 2xx body.
            return Err(RemoteError::Transient(format!(
                "server returned {}",
                status
            )));
        }

        let verdict: SubmitVerdict = resp
            .json()
            .await
            .map_err(|e| RemoteError::Transient(format!("malformed verdict: {}", e)))?;

        debug!(
            id = %event.id,
            accepted = verdict.accepted,
            geo_valid = verdict.geo_valid,
            "Submission verdict received"
        );
        Ok(verdict)
    }

    async fn submit_batch(
        &self,
        events: &[CollectionEvent],
    ) -> Result<Vec<BatchVerdict>, RemoteError> {
        let collections: Vec<serde_json::Value> = events.iter().map(Self::event_body).collect();

        let resp = self
            .authorized(
                self.http
                    .post(format!("{}/blockchain/batch-collection", self.base_url)),
            )
            .json(&serde_json::json!({ "collections": collections }))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RemoteError::Transient(format!(
                "server returned {}",
                status
            )));
        }

        let batch: BatchResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::Transient(format!("malformed batch response: {}", e)))?;

        debug!(submitted = events.len(), verdicts = batch.results.len(), "Batch verdicts received");
        Ok(batch.results)
    }

    async fn login(&self, collector_id: &str, pin: &str) -> Result<LoginResponse, RemoteError> {
        let resp = self
            .http
            .post(format!("{}/collector/login", self.base_url))
            .json(&serde_json::json!({
                "collector_id": collector_id,
                "pin": pin,
            }))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(RemoteError::CredentialsRejected);
        }
        if !status.is_success() {
            return Err(RemoteError::Transient(format!(
                "server returned {}",
                status
            )));
        }

        let login: LoginResponse = resp
            .json()
            .await
            .map_err(|e| RemoteError::Transient(format!("malformed login response: {}", e)))?;

        self.set_session_token(Some(&login.token));
        Ok(login)
    }

    async fn health_check(&self) -> bool {
        let result = self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(self.health_timeout)
            .send()
            .await;

        match result {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn set_session_token(&self, token: Option<&str>) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = token.map(str::to_string);
    }
}
