use chrono::Utc;

use super::{TrackerConverter, format_opt, instant};
use crate::domain::{Relationship, RelationshipItem, TrackerDto};
use crate::model::{RelationshipInstance, RelationshipItemRef, RelationshipType};
use crate::preheat::TrackerPreheat;

/// Converts relationships.
#[derive(Debug, Default, Clone, Copy)]
pub struct RelationshipConverter;

fn item_ref(item: Option<&RelationshipItem>) -> RelationshipItemRef {
    item.map(|item| RelationshipItemRef {
        tracked_entity_instance: item.tracked_entity.clone(),
        program_instance: item.enrollment.clone(),
        program_stage_instance: item.event.clone(),
    })
    .unwrap_or_default()
}

fn item(item_ref: &RelationshipItemRef) -> RelationshipItem {
    RelationshipItem {
        tracked_entity: item_ref.tracked_entity_instance.clone(),
        enrollment: item_ref.program_instance.clone(),
        event: item_ref.program_stage_instance.clone(),
    }
}

impl TrackerConverter for RelationshipConverter {
    type Dto = Relationship;
    type Domain = RelationshipInstance;

    fn to(&self, ri: &RelationshipInstance) -> Relationship {
        let relationship_type = ri.relationship_type.as_ref();
        Relationship {
            relationship: Some(ri.uid.clone()),
            relationship_type: relationship_type.map(|rt| rt.identity.uid.clone()),
            bidirectional: relationship_type.is_some_and(|rt| rt.bidirectional),
            from: Some(item(&ri.from)),
            to: Some(item(&ri.to)),
            created_at: format_opt(Some(&ri.created)),
            updated_at: format_opt(Some(&ri.last_updated)),
            deleted: ri.deleted,
        }
    }

    fn from(&self, preheat: &TrackerPreheat, relationship: &Relationship) -> RelationshipInstance {
        let now = Utc::now();
        let mut ri = preheat
            .get_relationship(relationship.uid())
            .cloned()
            .unwrap_or_else(|| RelationshipInstance {
                uid: relationship.uid().to_string(),
                relationship_type: None,
                from: RelationshipItemRef::default(),
                to: RelationshipItemRef::default(),
                created: instant(relationship.created_at.as_ref()).unwrap_or(now),
                last_updated: now,
                deleted: false,
            });

        ri.last_updated = now;
        if relationship.relationship_type.is_some() {
            ri.relationship_type =
                preheat.resolve::<RelationshipType>(relationship.relationship_type.as_deref());
        }
        if relationship.from.is_some() {
            ri.from = item_ref(relationship.from.as_ref());
        }
        if relationship.to.is_some() {
            ri.to = item_ref(relationship.to.as_ref());
        }
        ri
    }
}
