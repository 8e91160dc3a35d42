//! Internal model: metadata, value types, persistable tracker objects and
//! rule effects.

mod instance;
mod metadata;
mod rule;
mod value_type;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub use instance::{
    EnrollmentStatus, EventDataValue, EventStatus, ProgramInstance, ProgramStageInstance,
    RelationshipInstance, RelationshipItemRef, TrackedEntityAttributeValue, TrackedEntityComment,
    TrackedEntityInstance,
};
pub use metadata::{
    CategoryOption, CategoryOptionCombo, DataElement, MetadataIdentity, MetadataKind,
    MetadataObject, MetadataType, OrganisationUnit, Program, ProgramStage,
    ProgramStageDataElement, ProgramTrackedEntityAttribute, ProgramType, RelationshipEntity,
    RelationshipType, TrackedEntityAttribute, TrackedEntityType, TrackedEntityTypeAttribute,
};
pub use rule::{RuleAction, RuleEffect};
pub use value_type::{MAX_TEXT_LENGTH, ValueType, ValueTypeViolation};

const DATE_TIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Parses a wire timestamp.
///
/// Accepts RFC 3339, ISO-8601 without zone (read as UTC) and plain dates.
/// Returns `None` for anything else.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Formats an instant as ISO-8601 without zone, millisecond precision.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}
