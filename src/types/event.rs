//! Collection event types and the per-event status machine.

use crate::config::defaults::DEFAULT_UNIT;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Approved species for field collection.
///
/// The set is closed: the ledger only maintains geofenced zones for these
/// species, so the recording form offers nothing else.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Species {
    Ashwagandha,
    Tulsi,
    Brahmi,
    Guduchi,
    Shatavari,
}

impl Species {
    /// Botanical name shown alongside the common name.
    pub fn scientific_name(self) -> &'static str {
        match self {
            Species::Ashwagandha => "Withania somnifera",
            Species::Tulsi => "Ocimum sanctum",
            Species::Brahmi => "Bacopa monnieri",
            Species::Guduchi => "Tinospora cordifolia",
            Species::Shatavari => "Asparagus racemosus",
        }
    }

    /// Four-letter prefix used in batch/product correlation ids.
    pub fn product_prefix(self) -> &'static str {
        match self {
            Species::Ashwagandha => "ASHW",
            Species::Tulsi => "TULS",
            Species::Brahmi => "BRAH",
            Species::Guduchi => "GUDU",
            Species::Shatavari => "SHAT",
        }
    }

    /// All approved species, in form display order.
    pub fn all() -> [Species; 5] {
        [
            Species::Ashwagandha,
            Species::Tulsi,
            Species::Brahmi,
            Species::Guduchi,
            Species::Shatavari,
        ]
    }
}

impl std::fmt::Display for Species {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Species::Ashwagandha => "Ashwagandha",
            Species::Tulsi => "Tulsi",
            Species::Brahmi => "Brahmi",
            Species::Guduchi => "Guduchi",
            Species::Shatavari => "Shatavari",
        };
        write!(f, "{}", name)
    }
}

/// Captured device location. Immutable after creation: a resubmission
/// resends the same coordinates, it never re-captures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    /// Reported GPS accuracy radius in meters, when the fix provides one.
    pub accuracy_m: Option<f64>,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            accuracy_m: None,
        }
    }
}

/// Per-event sync status. Exactly one holds at any time.
///
/// `Synced` and `Rejected` are terminal: the only way out of `Rejected` is
/// explicit user deletion, and nothing leaves `Synced`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Not yet terminally resolved: covers "never attempted" and
    /// "attempted, failed transiently" alike.
    Pending,
    /// Committed to the ledger with a transaction reference.
    Synced,
    /// The ledger explicitly reported the coordinates outside the approved
    /// zones for the species.
    Rejected,
}

impl EventStatus {
    /// Whether this status is terminal for the event.
    pub fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Synced | EventStatus::Rejected)
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Pending => write!(f, "pending"),
            EventStatus::Synced => write!(f, "synced"),
            EventStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// History query filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Pending,
    Synced,
    Rejected,
}

impl StatusFilter {
    /// Whether an event with `status` passes this filter.
    pub fn matches(self, status: EventStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => status == EventStatus::Pending,
            StatusFilter::Synced => status == EventStatus::Synced,
            StatusFilter::Rejected => status == EventStatus::Rejected,
        }
    }
}

/// A single field-recorded collection event.
///
/// Identity and geolocation are fixed at creation; only `status`, `tx_id`
/// and `synced_at` change afterwards, and only through the sync
/// coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionEvent {
    /// Client-generated unique id, stable for the event's lifetime.
    pub id: String,
    /// Batch/product correlation id linking this event to downstream
    /// processing steps on the ledger.
    pub product_id: String,
    pub species: Species,
    pub scientific_name: Option<String>,
    pub location: GeoPoint,
    pub collector_id: String,
    /// Collected amount; positive by form validation.
    pub quantity: f64,
    pub unit: String,
    pub notes: Option<String>,
    /// Client clock at recording time.
    pub recorded_at: DateTime<Utc>,
    pub status: EventStatus,
    /// Remote transaction reference. `Some` iff `status == Synced`.
    pub tx_id: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
}

impl CollectionEvent {
    /// Record a new event at the current client clock, status `Pending`.
    pub fn new(
        species: Species,
        location: GeoPoint,
        collector_id: impl Into<String>,
        quantity: f64,
        unit: Option<String>,
        notes: Option<String>,
    ) -> Self {
        let batch = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("COL-{}", Uuid::new_v4()),
            product_id: format!("{}-{}", species.product_prefix(), &batch[..8]),
            species,
            scientific_name: Some(species.scientific_name().to_string()),
            location,
            collector_id: collector_id.into(),
            quantity,
            unit: unit.unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            notes,
            recorded_at: Utc::now(),
            status: EventStatus::Pending,
            tx_id: None,
            synced_at: None,
        }
    }

    /// Whether this event is still eligible for submission.
    pub fn is_pending(&self) -> bool {
        self.status == EventStatus::Pending
    }
}
