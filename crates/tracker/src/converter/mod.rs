//! Mapping between wire objects and persistable objects.
//!
//! `from` never fails: references that do not resolve through the preheat
//! are left empty and reported later by validation. For objects that already
//! exist, only the fields the wire object carries are overwritten. `to`
//! produces a best-effort wire object from whatever the persisted object holds.

mod enrollment;
mod event;
mod notes;
mod relationship;
mod tracked_entity;

use chrono::{DateTime, Utc};

use crate::model::{format_instant, parse_instant};
use crate::preheat::TrackerPreheat;

pub use enrollment::EnrollmentConverter;
pub use event::EventConverter;
pub use notes::NotesConverter;
pub use relationship::RelationshipConverter;
pub use tracked_entity::TrackedEntityConverter;

/// Bidirectional conversion for one tracker type.
pub trait TrackerConverter {
    /// Wire representation.
    type Dto;
    /// Persistable representation.
    type Domain;

    /// Builds the wire object for a persisted object.
    fn to(&self, domain: &Self::Domain) -> Self::Dto;

    fn to_all(&self, domains: &[Self::Domain]) -> Vec<Self::Dto> {
        domains.iter().map(|domain| self.to(domain)).collect()
    }

    /// Builds or updates the persistable object for a wire object.
    fn from(&self, preheat: &TrackerPreheat, dto: &Self::Dto) -> Self::Domain;

    fn from_all(&self, preheat: &TrackerPreheat, dtos: &[Self::Dto]) -> Vec<Self::Domain> {
        dtos.iter().map(|dto| self.from(preheat, dto)).collect()
    }
}

/// Parses an optional wire timestamp, dropping invalid values.
pub(crate) fn instant(value: Option<&String>) -> Option<DateTime<Utc>> {
    value.and_then(|v| parse_instant(v))
}

pub(crate) fn format_opt(value: Option<&DateTime<Utc>>) -> Option<String> {
    value.map(format_instant)
}

/// Username of the importing user, used for audit fields.
pub(crate) fn username(preheat: &TrackerPreheat) -> Option<String> {
    preheat.user().map(|user| user.username.clone())
}
