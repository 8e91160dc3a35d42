use serde::{Deserialize, Serialize};

use super::TrackerType;

/// One side of a relationship: exactly one of the fields should be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationshipItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_entity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
}

impl RelationshipItem {
    pub fn tracked_entity(uid: impl Into<String>) -> Self {
        Self {
            tracked_entity: Some(uid.into()),
            ..Default::default()
        }
    }

    pub fn enrollment(uid: impl Into<String>) -> Self {
        Self {
            enrollment: Some(uid.into()),
            ..Default::default()
        }
    }

    pub fn event(uid: impl Into<String>) -> Self {
        Self {
            event: Some(uid.into()),
            ..Default::default()
        }
    }

    /// Number of sides set. Valid items have exactly one.
    pub fn count_set(&self) -> usize {
        [&self.tracked_entity, &self.enrollment, &self.event]
            .into_iter()
            .filter(|side| side.is_some())
            .count()
    }

    /// The referenced object, if exactly one side is set.
    pub fn target(&self) -> Option<(TrackerType, &str)> {
        if self.count_set() != 1 {
            return None;
        }
        self.tracked_entity
            .as_deref()
            .map(|uid| (TrackerType::TrackedEntity, uid))
            .or_else(|| self.enrollment.as_deref().map(|uid| (TrackerType::Enrollment, uid)))
            .or_else(|| self.event.as_deref().map(|uid| (TrackerType::Event, uid)))
    }
}

/// A relationship as exchanged on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Relationship {
    pub relationship: Option<String>,
    pub relationship_type: Option<String>,
    pub bidirectional: bool,
    pub from: Option<RelationshipItem>,
    pub to: Option<RelationshipItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub deleted: bool,
}

/// Content identity of a relationship without an explicit UID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationshipKey {
    pub relationship_type: Option<String>,
    pub from: Option<RelationshipItem>,
    pub to: Option<RelationshipItem>,
}

impl Relationship {
    /// The (type, from, to) key used to collapse id-less duplicates.
    pub fn content_key(&self) -> RelationshipKey {
        RelationshipKey {
            relationship_type: self.relationship_type.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
        }
    }
}
