use serde::{Deserialize, Serialize};

use super::{DataValue, Note, Relationship};
use crate::model::{EnrollmentStatus, EventStatus};

/// An event as exchanged on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Event {
    pub event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_entity: Option<String>,
    /// Parent enrollment.
    pub enrollment: Option<String>,
    pub program: Option<String>,
    pub program_stage: Option<String>,
    pub org_unit: Option<String>,
    pub status: EventStatus,
    pub occurred_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub follow_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment_status: Option<EnrollmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_option_combo: Option<String>,
    /// Semicolon separated category options of the attribute option combo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute_category_options: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_user: Option<String>,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data_values: Vec<DataValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

impl Event {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            event: Some(uid.into()),
            ..Default::default()
        }
    }
}
