use super::is_known;
use crate::bundle::TrackerBundle;
use crate::domain::{TrackerDto, TrackerType};
use crate::model::{
    CategoryOptionCombo, OrganisationUnit, Program, ProgramStage, RelationshipType,
    TrackedEntityType,
};
use crate::user::User;
use crate::validation::{TrackerErrorCode, ValidationErrorReporter, ValidationHook};

/// Checks that metadata and parent references resolve.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetaReferenceValidationHook;

impl MetaReferenceValidationHook {
    fn tracked_entities(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        let preheat = &bundle.preheat;
        for te in bundle.tracked_entities() {
            let uid = te.uid();
            if let Some(tet) = te.tracked_entity_type.as_deref() {
                if preheat.resolve::<TrackedEntityType>(Some(tet)).is_none() {
                    reporter.add_error(TrackerType::TrackedEntity, uid, TrackerErrorCode::E1005, [tet]);
                }
            }
            if let Some(ou) = te.org_unit.as_deref() {
                if preheat.resolve::<OrganisationUnit>(Some(ou)).is_none() {
                    reporter.add_error(TrackerType::TrackedEntity, uid, TrackerErrorCode::E1049, [ou]);
                }
            }
        }
    }

    fn enrollments(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        let preheat = &bundle.preheat;
        for enrollment in bundle.enrollments() {
            let uid = enrollment.uid();
            if let Some(program) = enrollment.program.as_deref() {
                if preheat.resolve::<Program>(Some(program)).is_none() {
                    reporter.add_error(TrackerType::Enrollment, uid, TrackerErrorCode::E1069, [program]);
                }
            }
            if let Some(ou) = enrollment.org_unit.as_deref() {
                if preheat.resolve::<OrganisationUnit>(Some(ou)).is_none() {
                    reporter.add_error(TrackerType::Enrollment, uid, TrackerErrorCode::E1070, [ou]);
                }
            }
            if let Some(te) = enrollment.tracked_entity.as_deref() {
                if !is_known(bundle, TrackerType::TrackedEntity, te) {
                    reporter.add_error(TrackerType::Enrollment, uid, TrackerErrorCode::E1068, [te]);
                }
            }
        }
    }

    fn events(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        let preheat = &bundle.preheat;
        for event in bundle.events() {
            let uid = event.uid();
            if let Some(stage) = event.program_stage.as_deref() {
                if preheat.resolve::<ProgramStage>(Some(stage)).is_none() {
                    reporter.add_error(TrackerType::Event, uid, TrackerErrorCode::E1013, [stage]);
                }
            }
            if let Some(program) = event.program.as_deref() {
                if preheat.resolve::<Program>(Some(program)).is_none() {
                    reporter.add_error(TrackerType::Event, uid, TrackerErrorCode::E1010, [program]);
                }
            }
            if let Some(ou) = event.org_unit.as_deref() {
                if preheat.resolve::<OrganisationUnit>(Some(ou)).is_none() {
                    reporter.add_error(TrackerType::Event, uid, TrackerErrorCode::E1011, [ou]);
                }
            }
            if let Some(coc) = event.attribute_option_combo.as_deref() {
                if preheat.resolve::<CategoryOptionCombo>(Some(coc)).is_none() {
                    reporter.add_error(TrackerType::Event, uid, TrackerErrorCode::E1115, [coc]);
                }
            }

            let Some(psi) = bundle.program_stage_instance(uid) else {
                continue;
            };
            let stage = psi.program_stage.as_ref();
            if let Some(assigned) = event.assigned_user.as_deref() {
                let assignable = stage.is_some_and(|stage| stage.enable_user_assignment);
                if assignable && preheat.get_by_uid::<User>(assigned).is_none() {
                    reporter.add_error(TrackerType::Event, uid, TrackerErrorCode::E1118, [assigned]);
                }
            }

            let registration = event
                .program
                .as_deref()
                .and_then(|program| preheat.resolve::<Program>(Some(program)))
                .or_else(|| stage.and_then(|stage| preheat.get_by_uid::<Program>(&stage.program)))
                .is_some_and(|program| program.is_registration());
            let enrolled = psi
                .program_instance
                .as_deref()
                .is_some_and(|pi| is_known(bundle, TrackerType::Enrollment, pi));
            if registration && !enrolled {
                reporter.add_error(TrackerType::Event, uid, TrackerErrorCode::E1033, [uid]);
            }
        }
    }

    fn relationships(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        for relationship in bundle.relationships() {
            if let Some(rt) = relationship.relationship_type.as_deref() {
                if bundle.preheat.resolve::<RelationshipType>(Some(rt)).is_none() {
                    reporter.add_error(
                        TrackerType::Relationship,
                        relationship.uid(),
                        TrackerErrorCode::E4006,
                        [rt],
                    );
                }
            }
        }
    }
}

impl ValidationHook for MetaReferenceValidationHook {
    fn name(&self) -> &'static str {
        "MetaReferenceValidationHook"
    }

    fn order(&self) -> i32 {
        4
    }

    fn validate(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        self.tracked_entities(bundle, reporter);
        self.enrollments(bundle, reporter);
        self.events(bundle, reporter);
        self.relationships(bundle, reporter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Enrollment, Event, TrackedEntity, TrackerPayload};
    use crate::validation::hooks::testing::{ORG_UNIT, PROGRAM, STAGE, TET, bundle, run};

    #[test]
    fn test_unknown_metadata_is_reported() {
        let payload = TrackerPayload {
            tracked_entities: vec![TrackedEntity {
                tracked_entity_type: Some("missingTet1".to_string()),
                org_unit: Some(ORG_UNIT.to_string()),
                ..TrackedEntity::new("IOR1AXXl24H")
            }],
            enrollments: vec![Enrollment {
                program: Some("missingPrg1".to_string()),
                org_unit: Some("missingOu01".to_string()),
                tracked_entity: Some("IOR1AXXl24H".to_string()),
                ..Enrollment::new("MNWZ6hnuhSw")
            }],
            events: vec![Event {
                program_stage: Some(STAGE.to_string()),
                org_unit: Some(ORG_UNIT.to_string()),
                attribute_option_combo: Some("missingCoc1".to_string()),
                ..Event::new("ZwwuwNp6gVd")
            }],
            ..Default::default()
        };
        let report = run(&MetaReferenceValidationHook, &bundle(payload));
        let codes: Vec<_> = report.errors.iter().map(|e| e.error_code).collect();
        assert_eq!(
            codes,
            vec![
                TrackerErrorCode::E1005,
                TrackerErrorCode::E1069,
                TrackerErrorCode::E1070,
                TrackerErrorCode::E1115,
                TrackerErrorCode::E1033,
            ]
        );
    }

    #[test]
    fn test_resolved_references_pass() {
        let payload = TrackerPayload {
            tracked_entities: vec![TrackedEntity {
                tracked_entity_type: Some(TET.to_string()),
                org_unit: Some(ORG_UNIT.to_string()),
                ..TrackedEntity::new("IOR1AXXl24H")
            }],
            enrollments: vec![Enrollment {
                program: Some(PROGRAM.to_string()),
                org_unit: Some(ORG_UNIT.to_string()),
                tracked_entity: Some("IOR1AXXl24H".to_string()),
                ..Enrollment::new("MNWZ6hnuhSw")
            }],
            events: vec![Event {
                program_stage: Some(STAGE.to_string()),
                org_unit: Some(ORG_UNIT.to_string()),
                enrollment: Some("MNWZ6hnuhSw".to_string()),
                ..Event::new("ZwwuwNp6gVd")
            }],
            ..Default::default()
        };
        assert!(!run(&MetaReferenceValidationHook, &bundle(payload)).has_errors());
    }
}
