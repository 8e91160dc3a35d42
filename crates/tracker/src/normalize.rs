//! Payload flattening.
//!
//! Turns a nested tracked entity → enrollment → event tree (with relationships
//! at any level) into four flat collections. Missing UIDs are generated,
//! parent references are backfilled from the nesting and nested fields are
//! cleared. Each collection keeps the first object seen for a UID.

use std::collections::{HashMap, HashSet};
use std::mem;

use tracing::debug;

use crate::domain::{
    Enrollment, Event, Relationship, RelationshipKey, TrackedEntity, TrackerDto, TrackerPayload,
    TrackerType,
};
use crate::error::PayloadError;
use crate::identifier::CodeGenerator;

/// Flattens one payload.
///
/// Relationship ids generated for id-less relationships are keyed by content,
/// so identical relationships inside one payload collapse to a single id.
#[derive(Debug, Default)]
pub struct PayloadNormalizer {
    relationship_ids: HashMap<RelationshipKey, String>,
    relationships: Vec<Relationship>,
}

impl PayloadNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flattens `payload`. An empty payload is returned unchanged.
    pub fn normalize(mut self, payload: TrackerPayload) -> TrackerPayload {
        if payload.is_empty() {
            return payload;
        }

        let TrackerPayload {
            tracked_entities,
            enrollments,
            events,
            relationships,
        } = payload;

        let mut flat = TrackerPayload::default();
        let mut seen = HashSet::new();
        let mut nested_enrollments = Vec::new();

        for mut tracked_entity in tracked_entities {
            let uid = assign_uid(&mut tracked_entity.tracked_entity);
            for mut enrollment in mem::take(&mut tracked_entity.enrollments) {
                if enrollment.tracked_entity.is_none() {
                    enrollment.tracked_entity = Some(uid.clone());
                }
                nested_enrollments.push(enrollment);
            }
            self.relationships.append(&mut tracked_entity.relationships);
            push_unique(&mut flat.tracked_entities, &mut seen, tracked_entity);
        }

        let mut nested_events = Vec::new();
        for mut enrollment in enrollments.into_iter().chain(nested_enrollments) {
            let uid = assign_uid(&mut enrollment.enrollment);
            for mut event in mem::take(&mut enrollment.events) {
                if event.enrollment.is_none() {
                    event.enrollment = Some(uid.clone());
                }
                if event.tracked_entity.is_none() {
                    event.tracked_entity = enrollment.tracked_entity.clone();
                }
                nested_events.push(event);
            }
            self.relationships.append(&mut enrollment.relationships);
            push_unique(&mut flat.enrollments, &mut seen, enrollment);
        }

        for mut event in events.into_iter().chain(nested_events) {
            assign_uid(&mut event.event);
            self.relationships.append(&mut event.relationships);
            push_unique(&mut flat.events, &mut seen, event);
        }

        let nested = mem::take(&mut self.relationships);
        for mut relationship in relationships.into_iter().chain(nested) {
            if relationship.relationship.as_deref().is_none_or(str::is_empty) {
                let key = relationship.content_key();
                let uid = self
                    .relationship_ids
                    .entry(key)
                    .or_insert_with(CodeGenerator::generate_uid)
                    .clone();
                relationship.relationship = Some(uid);
            }
            push_unique(&mut flat.relationships, &mut seen, relationship);
        }

        debug!(
            tracked_entities = flat.tracked_entities.len(),
            enrollments = flat.enrollments.len(),
            events = flat.events.len(),
            relationships = flat.relationships.len(),
            "Payload normalized"
        );

        flat
    }
}

/// Flattens `payload` with a fresh normalizer.
pub fn normalize(payload: TrackerPayload) -> TrackerPayload {
    PayloadNormalizer::new().normalize(payload)
}

/// Checks that every object of a flattened payload has an identifier.
pub fn verify(payload: &TrackerPayload) -> Result<(), PayloadError> {
    fn check<T: TrackerDto>(objects: &[T]) -> Result<(), PayloadError> {
        match objects.iter().position(|object| object.uid().is_empty()) {
            Some(index) => Err(PayloadError::MissingIdentifier {
                tracker_type: T::TRACKER_TYPE,
                index,
            }),
            None => Ok(()),
        }
    }

    check::<TrackedEntity>(&payload.tracked_entities)?;
    check::<Enrollment>(&payload.enrollments)?;
    check::<Event>(&payload.events)?;
    check::<Relationship>(&payload.relationships)?;

    let nested = payload
        .tracked_entities
        .iter()
        .any(|te| !te.enrollments.is_empty() || !te.relationships.is_empty())
        || payload
            .enrollments
            .iter()
            .any(|e| !e.events.is_empty() || !e.relationships.is_empty())
        || payload.events.iter().any(|e| !e.relationships.is_empty());
    if nested {
        return Err(PayloadError::Malformed {
            message: "nested objects remain after flattening".to_string(),
        });
    }
    Ok(())
}

/// Appends `object` unless an object of the same type and UID is already
/// there.
fn push_unique<T: TrackerDto>(
    objects: &mut Vec<T>,
    seen: &mut HashSet<(TrackerType, String)>,
    object: T,
) {
    if seen.insert((T::TRACKER_TYPE, object.uid().to_string())) {
        objects.push(object);
    } else {
        debug!(tracker_type = %T::TRACKER_TYPE, uid = object.uid(), "Dropped duplicate object");
    }
}

fn assign_uid(uid: &mut Option<String>) -> String {
    match uid {
        Some(existing) if !existing.is_empty() => existing.clone(),
        _ => {
            let generated = CodeGenerator::generate_uid();
            *uid = Some(generated.clone());
            generated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RelationshipItem;

    fn relationship(from: &str, to: &str) -> Relationship {
        Relationship {
            relationship_type: Some("xLmPUYJX8Ks".to_string()),
            from: Some(RelationshipItem::tracked_entity(from)),
            to: Some(RelationshipItem::tracked_entity(to)),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_payload_short_circuits() {
        let payload = normalize(TrackerPayload::default());
        assert!(payload.is_empty());
    }

    #[test]
    fn test_nested_tree_is_flattened() {
        let mut enrollment = Enrollment::default();
        enrollment.events.push(Event::default());
        let mut tracked_entity = TrackedEntity::new("TEI1");
        tracked_entity.enrollments.push(enrollment);

        let payload = normalize(TrackerPayload {
            tracked_entities: vec![tracked_entity],
            ..Default::default()
        });

        assert_eq!(payload.tracked_entities.len(), 1);
        assert!(payload.tracked_entities[0].enrollments.is_empty());
        assert_eq!(payload.enrollments.len(), 1);
        assert_eq!(payload.events.len(), 1);

        let enrollment = &payload.enrollments[0];
        assert_eq!(enrollment.tracked_entity.as_deref(), Some("TEI1"));
        assert!(CodeGenerator::is_valid_uid(enrollment.uid()));
        assert!(enrollment.events.is_empty());
        assert_eq!(payload.events[0].enrollment.as_deref(), Some(enrollment.uid()));
        assert_eq!(payload.events[0].tracked_entity.as_deref(), Some("TEI1"));
        assert!(verify(&payload).is_ok());
    }

    #[test]
    fn test_explicit_parent_is_not_overwritten() {
        let mut enrollment = Enrollment::new("MNWZ6hnuhSw");
        enrollment.tracked_entity = Some("PQfMcpmXeFE".to_string());
        let mut tracked_entity = TrackedEntity::new("IOR1AXXl24H");
        tracked_entity.enrollments.push(enrollment);

        let payload = normalize(TrackerPayload {
            tracked_entities: vec![tracked_entity],
            ..Default::default()
        });
        assert_eq!(payload.enrollments[0].tracked_entity.as_deref(), Some("PQfMcpmXeFE"));
    }

    #[test]
    fn test_identical_relationships_share_generated_id() {
        let mut tracked_entity = TrackedEntity::new("IOR1AXXl24H");
        tracked_entity.relationships.push(relationship("IOR1AXXl24H", "PQfMcpmXeFE"));
        let payload = normalize(TrackerPayload {
            tracked_entities: vec![tracked_entity],
            relationships: vec![relationship("IOR1AXXl24H", "PQfMcpmXeFE")],
            ..Default::default()
        });
        assert_eq!(payload.relationships.len(), 1);
        assert!(payload.tracked_entities[0].relationships.is_empty());
    }

    #[test]
    fn test_distinct_relationships_keep_distinct_ids() {
        let payload = normalize(TrackerPayload {
            relationships: vec![
                relationship("IOR1AXXl24H", "PQfMcpmXeFE"),
                relationship("PQfMcpmXeFE", "IOR1AXXl24H"),
            ],
            ..Default::default()
        });
        assert_eq!(payload.relationships.len(), 2);
        assert_ne!(payload.relationships[0].uid(), payload.relationships[1].uid());
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let mut enrollment = Enrollment::default();
        enrollment.events.push(Event::default());
        let mut tracked_entity = TrackedEntity::new("TEI1");
        tracked_entity.enrollments.push(enrollment);
        tracked_entity.relationships.push(relationship("TEI1", "PQfMcpmXeFE"));

        let once = normalize(TrackerPayload {
            tracked_entities: vec![tracked_entity],
            ..Default::default()
        });
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_empty_relationship_id_is_generated() {
        let mut with_empty_id = relationship("IOR1AXXl24H", "PQfMcpmXeFE");
        with_empty_id.relationship = Some(String::new());
        let payload = normalize(TrackerPayload {
            tracked_entities: vec![TrackedEntity::new("IOR1AXXl24H")],
            relationships: vec![with_empty_id, relationship("IOR1AXXl24H", "PQfMcpmXeFE")],
            ..Default::default()
        });

        assert_eq!(payload.relationships.len(), 1);
        assert!(CodeGenerator::is_valid_uid(payload.relationships[0].uid()));
        assert!(verify(&payload).is_ok());
    }

    #[test]
    fn test_duplicate_uids_keep_first_object() {
        let mut nested = Enrollment::new("MNWZ6hnuhSw");
        nested.events.push(Event::new("ZwwuwNp6gVd"));
        let mut first = TrackedEntity::new("IOR1AXXl24H");
        first.enrollments.push(nested);
        let mut second = TrackedEntity::new("IOR1AXXl24H");
        second.org_unit = Some("DiszpKrYNg8".to_string());

        let top_level = Enrollment {
            program: Some("IpHINAT79UW".to_string()),
            ..Enrollment::new("MNWZ6hnuhSw")
        };
        let payload = normalize(TrackerPayload {
            tracked_entities: vec![first, second],
            enrollments: vec![top_level],
            events: vec![Event::new("ZwwuwNp6gVd")],
            ..Default::default()
        });

        assert_eq!(payload.tracked_entities.len(), 1);
        assert_eq!(payload.tracked_entities[0].org_unit, None);
        assert_eq!(payload.enrollments.len(), 1);
        assert_eq!(payload.enrollments[0].program.as_deref(), Some("IpHINAT79UW"));
        assert_eq!(payload.events.len(), 1);
        assert!(verify(&payload).is_ok());
    }

    #[test]
    fn test_verify_reports_missing_identifier() {
        let payload = TrackerPayload {
            events: vec![Event::new("ZwwuwNp6gVd"), Event::default()],
            ..Default::default()
        };
        assert!(matches!(
            verify(&payload),
            Err(PayloadError::MissingIdentifier { tracker_type: TrackerType::Event, index: 1 })
        ));
    }
}
