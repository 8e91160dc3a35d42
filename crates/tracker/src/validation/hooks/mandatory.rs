use super::is_new;
use crate::bundle::TrackerBundle;
use crate::domain::{TrackerDto, TrackerType};
use crate::model::Program;
use crate::validation::{TrackerErrorCode, ValidationErrorReporter, ValidationHook};

/// Checks the properties an object needs to be created.
///
/// Updates may carry only the fields they change, so the check applies to
/// objects that do not exist yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct MandatoryValidationHook;

fn missing<'a>(fields: impl IntoIterator<Item = (&'a str, bool)>) -> impl Iterator<Item = &'a str> {
    fields
        .into_iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name)
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

impl ValidationHook for MandatoryValidationHook {
    fn name(&self) -> &'static str {
        "MandatoryValidationHook"
    }

    fn order(&self) -> i32 {
        3
    }

    fn validate(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        for te in bundle.tracked_entities() {
            if !is_new(bundle, TrackerType::TrackedEntity, te.uid()) {
                continue;
            }
            for field in missing([
                ("trackedEntityType", present(&te.tracked_entity_type)),
                ("orgUnit", present(&te.org_unit)),
            ]) {
                reporter.add_error(TrackerType::TrackedEntity, te.uid(), TrackerErrorCode::E1121, [field]);
            }
        }

        for enrollment in bundle.enrollments() {
            if !is_new(bundle, TrackerType::Enrollment, enrollment.uid()) {
                continue;
            }
            let registration = bundle
                .preheat
                .resolve::<Program>(enrollment.program.as_deref())
                .is_none_or(|program| program.is_registration());
            for field in missing([
                ("program", present(&enrollment.program)),
                ("orgUnit", present(&enrollment.org_unit)),
                ("trackedEntity", !registration || present(&enrollment.tracked_entity)),
            ]) {
                reporter.add_error(TrackerType::Enrollment, enrollment.uid(), TrackerErrorCode::E1122, [field]);
            }
        }

        for event in bundle.events() {
            if !is_new(bundle, TrackerType::Event, event.uid()) {
                continue;
            }
            for field in missing([
                ("programStage", present(&event.program_stage)),
                ("orgUnit", present(&event.org_unit)),
            ]) {
                reporter.add_error(TrackerType::Event, event.uid(), TrackerErrorCode::E1123, [field]);
            }
        }

        for relationship in bundle.relationships() {
            if !is_new(bundle, TrackerType::Relationship, relationship.uid()) {
                continue;
            }
            for field in missing([
                ("relationshipType", present(&relationship.relationship_type)),
                ("from", relationship.from.is_some()),
                ("to", relationship.to.is_some()),
            ]) {
                reporter.add_error(
                    TrackerType::Relationship,
                    relationship.uid(),
                    TrackerErrorCode::E1124,
                    [field],
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Enrollment, Event, Relationship, TrackerPayload};
    use crate::validation::hooks::testing::{ORG_UNIT, bundle, run};

    #[test]
    fn test_missing_properties_are_listed() {
        let payload = TrackerPayload {
            enrollments: vec![Enrollment {
                org_unit: Some(ORG_UNIT.to_string()),
                ..Enrollment::new("MNWZ6hnuhSw")
            }],
            events: vec![Event::new("ZwwuwNp6gVd")],
            relationships: vec![Relationship {
                relationship: Some("Yc4tTDvj6Ae".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let report = run(&MandatoryValidationHook, &bundle(payload));
        let args: Vec<_> = report.errors.iter().map(|e| (e.error_code, e.args[0].as_str())).collect();
        assert_eq!(
            args,
            vec![
                (TrackerErrorCode::E1122, "program"),
                (TrackerErrorCode::E1122, "trackedEntity"),
                (TrackerErrorCode::E1123, "programStage"),
                (TrackerErrorCode::E1123, "orgUnit"),
                (TrackerErrorCode::E1124, "relationshipType"),
                (TrackerErrorCode::E1124, "from"),
                (TrackerErrorCode::E1124, "to"),
            ]
        );
    }
}
