//! In-memory event store for tests and minimal deployments.
//!
//! Same semantics as the sled backend, not durable. Thread-safe via
//! `RwLock`; a poisoned lock is recovered rather than propagated since the
//! maps hold plain data.

use super::{EventStore, StoreError, StoreStats};
use crate::config::defaults::HISTORY_PAGE_CAP;
use crate::types::{CollectionEvent, CollectorCredential, EventStatus, StatusFilter};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;

/// Non-durable store. Data is lost on restart.
#[derive(Default)]
pub struct MemoryEventStore {
    events: RwLock<HashMap<String, CollectionEvent>>,
    credentials: RwLock<HashMap<String, CollectorCredential>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_events(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, CollectionEvent>> {
        self.events.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_events(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, CollectionEvent>> {
        self.events.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventStore for MemoryEventStore {
    fn save(&self, event: &CollectionEvent) -> Result<(), StoreError> {
        let mut events = self.write_events();
        if events.contains_key(&event.id) {
            return Err(StoreError::DuplicateId(event.id.clone()));
        }
        events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<CollectionEvent>, StoreError> {
        Ok(self.read_events().get(id).cloned())
    }

    fn list_by_status(&self, filter: StatusFilter) -> Result<Vec<CollectionEvent>, StoreError> {
        let mut events: Vec<CollectionEvent> = self
            .read_events()
            .values()
            .filter(|e| filter.matches(e.status))
            .cloned()
            .collect();
        events.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        events.truncate(HISTORY_PAGE_CAP);
        Ok(events)
    }

    fn load_pending(&self) -> Result<Vec<CollectionEvent>, StoreError> {
        let mut events: Vec<CollectionEvent> = self
            .read_events()
            .values()
            .filter(|e| e.is_pending())
            .cloned()
            .collect();
        events.sort_by_key(|e| e.recorded_at);
        Ok(events)
    }

    fn update_status(
        &self,
        id: &str,
        status: EventStatus,
        tx_id: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut events = self.write_events();
        let Some(event) = events.get_mut(id) else {
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
        Ok(true)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.write_events().remove(id);
        Ok(())
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        self.write_events().clear();
        self.credentials
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        Ok(())
    }

    fn cache_credential(&self, credential: &CollectorCredential) -> Result<(), StoreError> {
        self.credentials
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(credential.collector_id.clone(), credential.clone());
        Ok(())
    }

    fn lookup_credential(
        &self,
        collector_id: &str,
        pin_hash: &str,
    ) -> Result<Option<CollectorCredential>, StoreError> {
        Ok(self
            .credentials
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(collector_id)
            .filter(|c| c.pin_hash == pin_hash)
            .cloned())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let mut stats = StoreStats::default();
        for event in self.read_events().values() {
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
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GeoPoint, Species};

    fn make_event() -> CollectionEvent {
        CollectionEvent::new(
            Species::Guduchi,
            GeoPoint::new(12.9, 77.6),
            "COLL-003",
            1.0,
            None,
            None,
        )
    }

    #[test]
    fn same_semantics_as_sled_for_duplicates() {
        let store = MemoryEventStore::new();
        let event = make_event();
        store.save(&event).unwrap();
        assert!(matches!(
            store.save(&event),
            Err(StoreError::DuplicateId(_))
        ));
    }

    #[test]
    fn trait_object_usable() {
        let store: Box<dyn EventStore> = Box::new(MemoryEventStore::new());
        assert_eq!(store.backend_name(), "memory");
        let event = make_event();
        store.save(&event).unwrap();
        assert_eq!(store.stats().unwrap().pending, 1);
        assert!(store
            .update_status(&event.id, EventStatus::Synced, Some("tx-9"))
            .unwrap());
        assert_eq!(store.stats().unwrap().synced, 1);
    }
}
