use std::collections::BTreeMap;

use super::attributes::{Subject, check_unique, check_value};
use super::is_new;
use crate::bundle::TrackerBundle;
use crate::domain::{Enrollment, TrackerDto, TrackerType};
use crate::model::{Program, TrackedEntityAttribute, TrackedEntityInstance};
use crate::user::AUTHORITY_IGNORE_REQUIRED_VALUE_VALIDATION;
use crate::validation::{TrackerErrorCode, ValidationErrorReporter, ValidationHook};

/// Validates the attributes sent with an enrollment against its program.
///
/// Every attribute must exist and carry a valid value. Mandatory program
/// attributes of a new enrollment must be present on the enrollment or on
/// its tracked entity, unless the user may skip required values. Attributes the program does not
/// declare are reported together in one E1019.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnrollmentAttributeValidationHook;

impl EnrollmentAttributeValidationHook {
    /// The enrolled tracked entity: from the bundle, else stored.
    fn tracked_entity<'a>(
        bundle: &'a TrackerBundle,
        enrollment: &Enrollment,
    ) -> Option<&'a TrackedEntityInstance> {
        let uid = enrollment.tracked_entity.as_deref()?;
        bundle
            .tracked_entity_instance(uid)
            .or_else(|| bundle.preheat.get_tracked_entity(uid))
    }

    fn validate_enrollment(
        &self,
        bundle: &TrackerBundle,
        reporter: &mut ValidationErrorReporter,
        enrollment: &Enrollment,
    ) {
        let uid = enrollment.uid();
        let tei = Self::tracked_entity(bundle, enrollment);
        let subject = Subject {
            tracker_type: TrackerType::Enrollment,
            uid,
            owner: enrollment.tracked_entity.as_deref(),
            org_unit: tei
                .and_then(|tei| tei.organisation_unit.as_ref())
                .map(|ou| ou.identity.uid.as_str()),
        };

        // Attribute UID to value, for the attributes that resolved.
        let mut values: BTreeMap<String, String> = BTreeMap::new();
        for attribute in &enrollment.attributes {
            let display = attribute
                .attribute
                .as_deref()
                .or(attribute.value.as_deref())
                .unwrap_or("null");
            if attribute.attribute.is_none() {
                reporter.add_error(TrackerType::Enrollment, uid, TrackerErrorCode::E1075, [display]);
            }
            if attribute.value.is_none() {
                reporter.add_error(TrackerType::Enrollment, uid, TrackerErrorCode::E1076, [display]);
            }
            let (Some(reference), Some(value)) =
                (attribute.attribute.as_deref(), attribute.value.as_deref())
            else {
                continue;
            };

            let Some(tea) = bundle.preheat.resolve::<TrackedEntityAttribute>(Some(reference)) else {
                reporter.add_error(TrackerType::Enrollment, uid, TrackerErrorCode::E1017, [reference]);
                continue;
            };
            values.insert(tea.identity.uid.clone(), value.to_string());
            check_value(bundle, reporter, subject, &tea, value);
            check_unique(bundle, reporter, subject, &tea, value);
        }

        let Some(program) = bundle.preheat.resolve::<Program>(enrollment.program.as_deref()) else {
            return;
        };

        let check_mandatory = is_new(bundle, TrackerType::Enrollment, uid)
            && !bundle
                .user()
                .is_authorized(AUTHORITY_IGNORE_REQUIRED_VALUE_VALIDATION);
        for program_attribute in &program.program_attributes {
            let attribute = program_attribute.attribute.as_str();
            let on_enrollment = values.remove(attribute).is_some();
            if !program_attribute.mandatory || !check_mandatory || on_enrollment {
                continue;
            }
            let on_tracked_entity = tei.is_some_and(|tei| {
                tei.attribute_values
                    .iter()
                    .any(|av| av.attribute == attribute && av.value.is_some())
            });
            if !on_tracked_entity {
                reporter.add_error(
                    TrackerType::Enrollment,
                    uid,
                    TrackerErrorCode::E1018,
                    [attribute, program.identity.uid.as_str(), uid],
                );
            }
        }

        if !values.is_empty() {
            let extraneous = values
                .iter()
                .map(|(attribute, value)| format!("{}={}", attribute, value))
                .collect::<Vec<_>>()
                .join(", ");
            reporter.add_error(TrackerType::Enrollment, uid, TrackerErrorCode::E1019, [extraneous]);
        }
    }
}

impl ValidationHook for EnrollmentAttributeValidationHook {
    fn name(&self) -> &'static str {
        "EnrollmentAttributeValidationHook"
    }

    fn order(&self) -> i32 {
        105
    }

    fn validate(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        for enrollment in bundle.enrollments() {
            self.validate_enrollment(bundle, reporter, enrollment);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Attribute, TrackedEntity, TrackerPayload};
    use crate::options::TrackerImportOptions;
    use crate::user::User;
    use crate::validation::hooks::testing::{
        FIRST_NAME, NATIONAL_ID, ORG_UNIT, PROGRAM, TET, bundle_with, preheat, run, user,
    };

    fn payload(attributes: Vec<Attribute>) -> TrackerPayload {
        TrackerPayload {
            tracked_entities: vec![TrackedEntity {
                tracked_entity_type: Some(TET.to_string()),
                org_unit: Some(ORG_UNIT.to_string()),
                ..TrackedEntity::new("IOR1AXXl24H")
            }],
            enrollments: vec![Enrollment {
                tracked_entity: Some("IOR1AXXl24H".to_string()),
                program: Some(PROGRAM.to_string()),
                org_unit: Some(ORG_UNIT.to_string()),
                attributes,
                ..Enrollment::new("MNWZ6hnuhSw")
            }],
            ..Default::default()
        }
    }

    fn validate(attributes: Vec<Attribute>, user: User) -> Vec<(TrackerErrorCode, Vec<String>)> {
        let bundle = bundle_with(payload(attributes), preheat(), user, TrackerImportOptions::default());
        run(&EnrollmentAttributeValidationHook, &bundle)
            .errors
            .into_iter()
            .map(|e| (e.error_code, e.args))
            .collect()
    }

    #[test]
    fn test_missing_mandatory_attribute() {
        let errors = validate(vec![Attribute::new(NATIONAL_ID, "123456")], user());
        assert_eq!(
            errors,
            vec![(
                TrackerErrorCode::E1018,
                vec![FIRST_NAME.to_string(), PROGRAM.to_string(), "MNWZ6hnuhSw".to_string()]
            )]
        );
    }

    #[test]
    fn test_override_authority_lifts_mandatory_check() {
        let user = user().with_authority(AUTHORITY_IGNORE_REQUIRED_VALUE_VALIDATION);
        assert!(validate(vec![], user).is_empty());
    }

    #[test]
    fn test_stored_enrollment_skips_mandatory_check() {
        use crate::converter::{EnrollmentConverter, TrackerConverter};

        let mut preheat = preheat();
        let stored = EnrollmentConverter.from(&preheat, &payload(vec![]).enrollments[0]);
        preheat.put_enrollments(vec![stored]);
        let bundle = bundle_with(
            payload(vec![Attribute::new(NATIONAL_ID, "123456")]),
            preheat,
            user(),
            TrackerImportOptions::default(),
        );
        assert!(run(&EnrollmentAttributeValidationHook, &bundle).errors.is_empty());
    }

    #[test]
    fn test_extraneous_attributes_are_aggregated() {
        let mut preheat = preheat();
        preheat.put_metadata(
            &crate::identifier::TrackerIdScheme::Uid,
            vec![
                crate::model::MetadataObject::TrackedEntityAttribute(std::sync::Arc::new(
                    TrackedEntityAttribute {
                        identity: crate::model::MetadataIdentity::new("zDhUuAYrxNC", "Last name"),
                        ..Default::default()
                    },
                )),
                crate::model::MetadataObject::TrackedEntityAttribute(std::sync::Arc::new(
                    TrackedEntityAttribute {
                        identity: crate::model::MetadataIdentity::new("cejWyOfXge6", "Gender"),
                        ..Default::default()
                    },
                )),
            ],
        );
        let attributes = vec![
            Attribute::new(FIRST_NAME, "Jane"),
            Attribute::new("zDhUuAYrxNC", "Doe"),
            Attribute::new("cejWyOfXge6", "Female"),
        ];
        let bundle = bundle_with(payload(attributes), preheat, user(), Default::default());
        let report = run(&EnrollmentAttributeValidationHook, &bundle);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].error_code, TrackerErrorCode::E1019);
        assert_eq!(report.errors[0].args, vec!["cejWyOfXge6=Female, zDhUuAYrxNC=Doe"]);
    }

    #[test]
    fn test_null_and_unknown_attributes() {
        let errors = validate(
            vec![
                Attribute::new(FIRST_NAME, "Jane"),
                Attribute {
                    attribute: Some(NATIONAL_ID.to_string()),
                    ..Default::default()
                },
                Attribute::new("missingAtt1", "x"),
            ],
            user(),
        );
        let codes: Vec<_> = errors.iter().map(|(code, _)| *code).collect();
        assert_eq!(codes, vec![TrackerErrorCode::E1076, TrackerErrorCode::E1017]);
    }
}
