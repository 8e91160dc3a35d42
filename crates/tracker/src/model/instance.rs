//! Persistable tracker objects produced by the converters.
//!
//! Metadata references are shared `Arc`s resolved from the preheat cache.
//! References between tracker objects are held as UIDs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    CategoryOptionCombo, OrganisationUnit, Program, ProgramStage, RelationshipType,
    TrackedEntityType,
};
use crate::user::User;

/// Status of an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

/// Status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    #[default]
    Active,
    Completed,
    Visited,
    Schedule,
    Overdue,
    Skipped,
}

/// An attribute value held by a tracked entity instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntityAttributeValue {
    /// Attribute UID.
    pub attribute: String,
    pub value: Option<String>,
    pub stored_by: Option<String>,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// A persisted tracked entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntityInstance {
    pub uid: String,
    pub tracked_entity_type: Option<Arc<TrackedEntityType>>,
    pub organisation_unit: Option<Arc<OrganisationUnit>>,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub created_at_client: Option<DateTime<Utc>>,
    pub last_updated_at_client: Option<DateTime<Utc>>,
    pub inactive: bool,
    pub deleted: bool,
    pub geometry: Option<serde_json::Value>,
    pub stored_by: Option<String>,
    pub attribute_values: Vec<TrackedEntityAttributeValue>,
}

/// A note attached to an enrollment or event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedEntityComment {
    pub uid: String,
    pub comment_text: String,
    pub creator: Option<String>,
    pub created: DateTime<Utc>,
}

/// A persisted enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramInstance {
    pub uid: String,
    pub program: Option<Arc<Program>>,
    /// UID of the enrolled tracked entity. Empty for programs without registration.
    pub entity_instance: Option<String>,
    pub organisation_unit: Option<Arc<OrganisationUnit>>,
    pub status: EnrollmentStatus,
    pub enrollment_date: Option<DateTime<Utc>>,
    pub incident_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub follow_up: bool,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub created_at_client: Option<DateTime<Utc>>,
    pub last_updated_at_client: Option<DateTime<Utc>>,
    pub stored_by: Option<String>,
    pub deleted: bool,
    pub geometry: Option<serde_json::Value>,
    pub comments: Vec<TrackedEntityComment>,
}

/// A data value captured on an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDataValue {
    /// Data element UID.
    pub data_element: String,
    pub value: Option<String>,
    pub provided_elsewhere: bool,
    pub stored_by: Option<String>,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// A persisted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramStageInstance {
    pub uid: String,
    pub program_stage: Option<Arc<ProgramStage>>,
    /// UID of the owning enrollment.
    pub program_instance: Option<String>,
    /// Owner of the enrollment, denormalized for reads.
    pub tracked_entity_instance: Option<String>,
    /// Status of the enrollment when the event was last written.
    pub enrollment_status: Option<EnrollmentStatus>,
    pub follow_up: bool,
    pub organisation_unit: Option<Arc<OrganisationUnit>>,
    pub attribute_option_combo: Option<Arc<CategoryOptionCombo>>,
    pub status: EventStatus,
    pub execution_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_date: Option<DateTime<Utc>>,
    pub completed_by: Option<String>,
    pub stored_by: Option<String>,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub created_at_client: Option<DateTime<Utc>>,
    pub last_updated_at_client: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub geometry: Option<serde_json::Value>,
    pub assigned_user: Option<Arc<User>>,
    pub event_data_values: Vec<EventDataValue>,
    pub comments: Vec<TrackedEntityComment>,
}

impl ProgramStageInstance {
    /// Returns `true` when the event is completed.
    pub fn is_completed(&self) -> bool {
        self.status == EventStatus::Completed
    }
}

/// One side of a persisted relationship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipItemRef {
    pub tracked_entity_instance: Option<String>,
    pub program_instance: Option<String>,
    pub program_stage_instance: Option<String>,
}

impl RelationshipItemRef {
    /// The UID of whichever object this side points to.
    pub fn uid(&self) -> Option<&str> {
        self.tracked_entity_instance
            .as_deref()
            .or(self.program_instance.as_deref())
            .or(self.program_stage_instance.as_deref())
    }
}

/// A persisted relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipInstance {
    pub uid: String,
    pub relationship_type: Option<Arc<RelationshipType>>,
    pub from: RelationshipItemRef,
    pub to: RelationshipItemRef,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub deleted: bool,
}
