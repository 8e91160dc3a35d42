use serde::{Deserialize, Serialize};

use super::{Attribute, Event, Note, Relationship};
use crate::model::EnrollmentStatus;

/// An enrollment as exchanged on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Enrollment {
    pub enrollment: Option<String>,
    /// Parent tracked entity.
    pub tracked_entity: Option<String>,
    pub program: Option<String>,
    pub org_unit: Option<String>,
    pub status: EnrollmentStatus,
    pub enrolled_at: Option<String>,
    pub occurred_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_by: Option<String>,
    pub follow_up: bool,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,
}

impl Enrollment {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            enrollment: Some(uid.into()),
            ..Default::default()
        }
    }
}
