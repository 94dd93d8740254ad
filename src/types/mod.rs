//! Core domain types for the field sync engine.

pub mod collector;
pub mod event;

pub use collector::{CollectorCredential, CollectorProfile, Session};
pub use event::{CollectionEvent, EventStatus, GeoPoint, Species, StatusFilter};
