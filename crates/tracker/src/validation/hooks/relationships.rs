use super::is_known;
use crate::bundle::TrackerBundle;
use crate::domain::{Relationship, TrackerDto, TrackerType};
use crate::validation::{TrackerErrorCode, ValidationErrorReporter, ValidationHook};

/// Validates relationship items.
///
/// Each side must point at exactly one object, the sides must differ and
/// both objects must be in the bundle or stored.
#[derive(Debug, Default, Clone, Copy)]
pub struct RelationshipsValidationHook;

impl RelationshipsValidationHook {
    fn validate_relationship(
        &self,
        bundle: &TrackerBundle,
        reporter: &mut ValidationErrorReporter,
        relationship: &Relationship,
    ) {
        let uid = relationship.uid();
        let mut targets = Vec::with_capacity(2);
        for (side, item) in [("from", &relationship.from), ("to", &relationship.to)] {
            let Some(item) = item else {
                continue;
            };
            match item.target() {
                Some(target) => targets.push(target),
                None => reporter.add_error(TrackerType::Relationship, uid, TrackerErrorCode::E4001, [side, uid]),
            }
        }

        if let [from, to] = targets.as_slice() {
            if from == to {
                reporter.add_error(TrackerType::Relationship, uid, TrackerErrorCode::E4000, [uid]);
            }
        }
        for (tracker_type, target) in targets {
            if !is_known(bundle, tracker_type, target) {
                reporter.add_error(
                    TrackerType::Relationship,
                    uid,
                    TrackerErrorCode::E4012,
                    [tracker_type.as_str(), target],
                );
            }
        }
    }
}

impl ValidationHook for RelationshipsValidationHook {
    fn name(&self) -> &'static str {
        "RelationshipsValidationHook"
    }

    fn order(&self) -> i32 {
        120
    }

    fn validate(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        for relationship in bundle.relationships() {
            self.validate_relationship(bundle, reporter, relationship);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RelationshipItem, TrackedEntity, TrackerPayload};
    use crate::validation::hooks::testing::{RELATIONSHIP_TYPE, bundle, run};

    fn relationship(uid: &str, from: RelationshipItem, to: RelationshipItem) -> Relationship {
        Relationship {
            relationship: Some(uid.to_string()),
            relationship_type: Some(RELATIONSHIP_TYPE.to_string()),
            from: Some(from),
            to: Some(to),
            ..Default::default()
        }
    }

    #[test]
    fn test_relationship_items() {
        let both = RelationshipItem {
            tracked_entity: Some("IOR1AXXl24H".to_string()),
            event: Some("ZwwuwNp6gVd".to_string()),
            ..Default::default()
        };
        let payload = TrackerPayload {
            tracked_entities: vec![TrackedEntity::new("IOR1AXXl24H"), TrackedEntity::new("QWR1AXXl24H")],
            relationships: vec![
                relationship(
                    "Yc4tTDvj6Ae",
                    RelationshipItem::tracked_entity("IOR1AXXl24H"),
                    RelationshipItem::tracked_entity("QWR1AXXl24H"),
                ),
                relationship(
                    "Zc4tTDvj6Ae",
                    RelationshipItem::tracked_entity("IOR1AXXl24H"),
                    RelationshipItem::tracked_entity("IOR1AXXl24H"),
                ),
                relationship("Xc4tTDvj6Ae", both, RelationshipItem::event("missingEv01")),
            ],
            ..Default::default()
        };
        let report = run(&RelationshipsValidationHook, &bundle(payload));
        let errors: Vec<_> = report.errors.iter().map(|e| (e.uid.as_str(), e.error_code)).collect();
        assert_eq!(
            errors,
            vec![
                ("Zc4tTDvj6Ae", TrackerErrorCode::E4000),
                ("Xc4tTDvj6Ae", TrackerErrorCode::E4001),
                ("Xc4tTDvj6Ae", TrackerErrorCode::E4012),
            ]
        );
    }
}
