use serde::{Deserialize, Serialize};

use super::{Attribute, Enrollment, Relationship};

/// A tracked entity as exchanged on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackedEntity {
    pub tracked_entity: Option<String>,
    pub tracked_entity_type: Option<String>,
    pub org_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub inactive: bool,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub enrollments: Vec<Enrollment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

impl TrackedEntity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            tracked_entity: Some(uid.into()),
            ..Default::default()
        }
    }
}
