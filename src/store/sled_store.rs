//! Sled-backed event store.
//!
//! Two named trees inside one sled database: `events` (keyed by event id)
//! and `credentials` (keyed by collector id, at most one row per id).
//! Values are JSON. Every write is flushed before returning: an event must
//! be durable on disk before the coordinator's in-memory projection ever
//! sees it, so a process kill between the two can lose nothing.

use super::{EventStore, StoreError, StoreStats};
use crate::config::defaults::HISTORY_PAGE_CAP;
use crate::types::{CollectionEvent, CollectorCredential, EventStatus, StatusFilter};
use chrono::Utc;
use sled::Tree;
use std::path::Path;
use tracing::{debug, error, info};

/// Durable event store for real devices.
#[derive(Clone)]
pub struct SledEventStore {
    db: sled::Db,
    events: Tree,
    credentials: Tree,
}

impl SledEventStore {
    /// Open or create the store at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let db = sled::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        let events = db
            .open_tree("events")
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let credentials = db
            .open_tree("credentials")
            .map_err(|e| StoreError::Database(e.to_string()))?;

        info!(path = %path.display(), events = events.len(), "Event store opened");

        Ok(Self {
            db,
            events,
            credentials,
        })
    }

    fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map(|_| ())
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Deserialize every readable event, skipping corrupted rows.
    fn scan_events(&self) -> Result<Vec<CollectionEvent>, StoreError> {
        let mut events = Vec::new();
        for item in self.events.iter() {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            match serde_json::from_slice::<CollectionEvent>(&value) {
                Ok(event) => events.push(event),
                Err(e) => {
                    error!(
                        key = %String::from_utf8_lossy(&key),
                        error = %e,
                        "Corrupted event row, skipping"
                    );
                }
            }
        }
        Ok(events)
    }
}

impl EventStore for SledEventStore {
    fn save(&self, event: &CollectionEvent) -> Result<(), StoreError> {
        if self
            .events
            .contains_key(event.id.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
        {
            return Err(StoreError::DuplicateId(event.id.clone()));
        }

        let value =
            serde_json::to_vec(event).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.events
            .insert(event.id.as_bytes(), value)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        self.flush()?;

        debug!(id = %event.id, species = %event.species, "Event saved");
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<CollectionEvent>, StoreError> {
        match self
            .events
            .get(id.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
        {
            Some(value) => {
                let event = serde_json::from_slice(&value)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(event))
            }
            None => Ok(None),
        }
    }

    fn list_by_status(&self, filter: StatusFilter) -> Result<Vec<CollectionEvent>, StoreError> {
        let mut events = self.scan_events()?;
        events.retain(|e| filter.matches(e.status));
        events.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        events.truncate(HISTORY_PAGE_CAP);
        Ok(events)
    }

    fn load_pending(&self) -> Result<Vec<CollectionEvent>, StoreError> {
        let mut events = self.scan_events()?;
        events.retain(CollectionEvent::is_pending);
        events.sort_by_key(|e| e.recorded_at);
        Ok(events)
    }

    fn update_status(
        &self,
        id: &str,
        status: EventStatus,
        tx_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        let Some(mut event) = self.get(id)? else {
            return Ok(false);
        };

        event.status = status;
        if status == EventStatus::Synced {
            event.tx_id = tx_id.map(str::to_string);
            event.synced_at = Some(Utc::now());
        } else {
            event.tx_id = None;
            event.synced_at = None;
        }

        let value =
            serde_json::to_vec(&event).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.events
            .insert(id.as_bytes(), value)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        self.flush()?;

        debug!(id = id, status = %status, "Event status updated");
        Ok(true)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.events
            .remove(id.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?;
        self.flush()
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        self.events
            .clear()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        self.credentials
            .clear()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        self.flush()?;
        info!("Event store cleared");
        Ok(())
    }

    fn cache_credential(&self, credential: &CollectorCredential) -> Result<(), StoreError> {
        let value = serde_json::to_vec(credential)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        // Last login wins: one row per collector id.
        self.credentials
            .insert(credential.collector_id.as_bytes(), value)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        self.flush()?;

        debug!(collector_id = %credential.collector_id, "Credential cached");
        Ok(())
    }

    fn lookup_credential(
        &self,
        collector_id: &str,
        pin_hash: &str,
    ) -> Result<Option<CollectorCredential>, StoreError> {
        let Some(value) = self
            .credentials
            .get(collector_id.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let credential: CollectorCredential = serde_json::from_slice(&value)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        if credential.pin_hash == pin_hash {
            Ok(Some(credential))
        } else {
            Ok(None)
        }
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut stats = StoreStats::default();
        for event in self.scan_events()? {
            stats.total += 1;
            match event.status {
                EventStatus::Pending => stats.pending += 1,
                EventStatus::Synced => stats.synced += 1,
                EventStatus::Rejected => stats.rejected += 1,
            }
        }
        Ok(stats)
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}
