//! Wire representation of tracker objects.
//!
//! These are the shapes clients send and receive. They may nest children on
//! input; [`normalize`](crate::normalize) flattens them before anything else
//! looks at them.

mod common;
mod enrollment;
mod event;
mod payload;
mod relationship;
mod tracked_entity;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use common::{Attribute, DataValue, Note};
pub use enrollment::Enrollment;
pub use event::Event;
pub use payload::TrackerPayload;
pub use relationship::{Relationship, RelationshipItem, RelationshipKey};
pub use tracked_entity::TrackedEntity;

/// The four kinds of tracker objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackerType {
    TrackedEntity,
    Enrollment,
    Event,
    Relationship,
}

impl TrackerType {
    /// Parent-first order used for validation and for create/update commits.
    pub const ALL: [TrackerType; 4] = [
        TrackerType::TrackedEntity,
        TrackerType::Enrollment,
        TrackerType::Event,
        TrackerType::Relationship,
    ];

    /// Child-first order used when deleting.
    pub const DELETE_ORDER: [TrackerType; 4] = [
        TrackerType::Relationship,
        TrackerType::Event,
        TrackerType::Enrollment,
        TrackerType::TrackedEntity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerType::TrackedEntity => "trackedEntity",
            TrackerType::Enrollment => "enrollment",
            TrackerType::Event => "event",
            TrackerType::Relationship => "relationship",
        }
    }
}

impl fmt::Display for TrackerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common view over the four wire types.
pub trait TrackerDto {
    /// The kind of object.
    const TRACKER_TYPE: TrackerType;

    /// The object UID, or an empty string before normalization.
    fn uid(&self) -> &str;

    /// Whether the client flagged the object as deleted.
    fn is_deleted(&self) -> bool;
}

macro_rules! tracker_dto {
    ($ty:ident, $field:ident) => {
        impl TrackerDto for $ty {
            const TRACKER_TYPE: TrackerType = TrackerType::$ty;

            fn uid(&self) -> &str {
                self.$field.as_deref().unwrap_or_default()
            }

            fn is_deleted(&self) -> bool {
                self.deleted
            }
        }
    };
}

tracker_dto!(TrackedEntity, tracked_entity);
tracker_dto!(Enrollment, enrollment);
tracker_dto!(Event, event);
tracker_dto!(Relationship, relationship);
