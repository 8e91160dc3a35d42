use super::attributes::{Subject, check_unique, check_value};
use super::is_new;
use crate::bundle::TrackerBundle;
use crate::domain::{TrackerDto, TrackerType};
use crate::model::{TrackedEntityAttribute, TrackedEntityType};
use crate::user::AUTHORITY_IGNORE_REQUIRED_VALUE_VALIDATION;
use crate::validation::{TrackerErrorCode, ValidationErrorReporter, ValidationHook};

/// Validates tracked entity attribute values.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackedEntityAttributeValidationHook;

impl ValidationHook for TrackedEntityAttributeValidationHook {
    fn name(&self) -> &'static str {
        "TrackedEntityAttributeValidationHook"
    }

    fn order(&self) -> i32 {
        100
    }

    fn validate(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        let preheat = &bundle.preheat;
        for te in bundle.tracked_entities() {
            let uid = te.uid();
            let tei = bundle.tracked_entity_instance(uid);
            let subject = Subject {
                tracker_type: TrackerType::TrackedEntity,
                uid,
                owner: Some(uid),
                org_unit: tei
                    .and_then(|tei| tei.organisation_unit.as_ref())
                    .map(|ou| ou.identity.uid.as_str()),
            };

            for attribute in &te.attributes {
                let Some(reference) = attribute.attribute.as_deref() else {
                    continue;
                };
                let Some(tea) = preheat.resolve::<TrackedEntityAttribute>(Some(reference)) else {
                    reporter.add_error(TrackerType::TrackedEntity, uid, TrackerErrorCode::E1006, [reference]);
                    continue;
                };
                let Some(value) = attribute.value.as_deref() else {
                    continue;
                };
                check_value(bundle, reporter, subject, &tea, value);
                check_unique(bundle, reporter, subject, &tea, value);
            }

            if !is_new(bundle, TrackerType::TrackedEntity, uid)
                || bundle.user().is_authorized(AUTHORITY_IGNORE_REQUIRED_VALUE_VALIDATION)
            {
                continue;
            }
            let (Some(tei), Some(tet)) = (tei, preheat.resolve::<TrackedEntityType>(te.tracked_entity_type.as_deref())) else {
                continue;
            };
            for mandatory in tet.attributes.iter().filter(|a| a.mandatory) {
                let present = tei
                    .attribute_values
                    .iter()
                    .any(|av| av.attribute == mandatory.attribute && av.value.is_some());
                if !present {
                    reporter.add_error(
                        TrackerType::TrackedEntity,
                        uid,
                        TrackerErrorCode::E1090,
                        [mandatory.attribute.as_str(), tet.identity.uid.as_str(), uid],
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Attribute, TrackedEntity, TrackerPayload};
    use crate::options::TrackerImportOptions;
    use crate::store::UniqueAttributeValue;
    use crate::validation::hooks::testing::{
        FIRST_NAME, NATIONAL_ID, ORG_UNIT, TET, bundle, bundle_with, preheat, run, user,
    };

    fn te(uid: &str, attributes: Vec<Attribute>) -> TrackedEntity {
        TrackedEntity {
            tracked_entity_type: Some(TET.to_string()),
            org_unit: Some(ORG_UNIT.to_string()),
            attributes,
            ..TrackedEntity::new(uid)
        }
    }

    fn codes(payload: TrackerPayload) -> Vec<TrackerErrorCode> {
        run(&TrackedEntityAttributeValidationHook, &bundle(payload))
            .errors
            .iter()
            .map(|e| e.error_code)
            .collect()
    }

    #[test]
    fn test_value_type_and_pattern() {
        let payload = TrackerPayload {
            tracked_entities: vec![te(
                "IOR1AXXl24H",
                vec![
                    Attribute::new(FIRST_NAME, "Jane"),
                    Attribute::new(NATIONAL_ID, "12a"),
                    Attribute::new("missingAtt1", "x"),
                ],
            )],
            ..Default::default()
        };
        assert_eq!(
            codes(payload),
            vec![TrackerErrorCode::E1007, TrackerErrorCode::E1008, TrackerErrorCode::E1006]
        );
    }

    #[test]
    fn test_pattern_check_can_be_skipped() {
        let payload = TrackerPayload {
            tracked_entities: vec![te(
                "IOR1AXXl24H",
                vec![Attribute::new(FIRST_NAME, "Jane"), Attribute::new(NATIONAL_ID, "12")],
            )],
            ..Default::default()
        };
        let options = TrackerImportOptions {
            skip_text_pattern_validation: true,
            ..Default::default()
        };
        let bundle = bundle_with(payload, preheat(), user(), options);
        assert!(!run(&TrackedEntityAttributeValidationHook, &bundle).has_errors());
    }

    #[test]
    fn test_unique_values() {
        let mut preheat = preheat();
        preheat.put_unique_attribute_values(vec![UniqueAttributeValue {
            attribute: NATIONAL_ID.to_string(),
            value: "123456".to_string(),
            tracked_entity: "QWR1AXXl24H".to_string(),
            org_unit: Some(ORG_UNIT.to_string()),
        }]);
        let payload = TrackerPayload {
            tracked_entities: vec![
                te(
                    "IOR1AXXl24H",
                    vec![Attribute::new(FIRST_NAME, "Jane"), Attribute::new(NATIONAL_ID, "123456")],
                ),
                te(
                    "PQR1AXXl24H",
                    vec![Attribute::new(FIRST_NAME, "John"), Attribute::new(NATIONAL_ID, "654321")],
                ),
            ],
            ..Default::default()
        };
        let bundle = bundle_with(payload, preheat, user(), Default::default());
        let report = run(&TrackedEntityAttributeValidationHook, &bundle);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].error_code, TrackerErrorCode::E1064);
        assert_eq!(report.errors[0].uid, "IOR1AXXl24H");
    }

    #[test]
    fn test_mandatory_type_attribute() {
        let payload = TrackerPayload {
            tracked_entities: vec![te("IOR1AXXl24H", vec![])],
            ..Default::default()
        };
        assert_eq!(codes(payload), vec![TrackerErrorCode::E1090]);
    }
}
