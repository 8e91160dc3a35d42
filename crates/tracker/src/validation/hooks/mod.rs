//! The built-in validation hooks.

mod attributes;
mod enrollment_attribute;
mod event;
mod existence;
mod mandatory;
mod preheat;
mod references;
mod relationships;
mod rule_engine;
mod security;
mod tracked_entity_attribute;
mod uid;

use super::ValidationHook;
use crate::bundle::TrackerBundle;
use crate::domain::TrackerType;

pub use enrollment_attribute::EnrollmentAttributeValidationHook;
pub use event::{EventDataValuesValidationHook, EventDateValidationHook};
pub use existence::ExistenceValidationHook;
pub use mandatory::MandatoryValidationHook;
pub use preheat::PreheatValidationHook;
pub use references::MetaReferenceValidationHook;
pub use relationships::RelationshipsValidationHook;
pub use rule_engine::RuleEngineValidationHook;
pub use security::OrgUnitSecurityValidationHook;
pub use tracked_entity_attribute::TrackedEntityAttributeValidationHook;
pub use uid::UidValidationHook;

/// The built-in hook chain.
pub fn default_hooks() -> Vec<Box<dyn ValidationHook>> {
    vec![
        Box::new(PreheatValidationHook),
        Box::new(UidValidationHook),
        Box::new(ExistenceValidationHook),
        Box::new(MandatoryValidationHook),
        Box::new(MetaReferenceValidationHook),
        Box::new(OrgUnitSecurityValidationHook),
        Box::new(TrackedEntityAttributeValidationHook),
        Box::new(EnrollmentAttributeValidationHook),
        Box::new(EventDataValuesValidationHook),
        Box::new(EventDateValidationHook),
        Box::new(RelationshipsValidationHook),
        Box::new(RuleEngineValidationHook),
    ]
}

/// Returns `true` if the object is in the bundle or stored and not deleted.
pub(crate) fn is_known(bundle: &TrackerBundle, tracker_type: TrackerType, uid: &str) -> bool {
    bundle.contains(tracker_type, uid) || bundle.preheat.is_deleted(tracker_type, uid) == Some(false)
}

/// Returns `true` if the object will be created by this import.
pub(crate) fn is_new(bundle: &TrackerBundle, tracker_type: TrackerType, uid: &str) -> bool {
    !bundle.preheat.exists(tracker_type, uid)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Bundle fixtures shared by the hook tests.

    use std::sync::Arc;

    use crate::bundle::{BundleConfig, BundleObjects, TrackerBundle};
    use crate::domain::TrackerPayload;
    use crate::identifier::{TrackerIdScheme, TrackerIdentifierParams};
    use crate::model::{
        CategoryOptionCombo, DataElement, MetadataIdentity, MetadataObject, OrganisationUnit,
        Program, ProgramStage, ProgramStageDataElement, ProgramTrackedEntityAttribute,
        RelationshipType, TrackedEntityAttribute, TrackedEntityType, TrackedEntityTypeAttribute,
        ValueType,
    };
    use crate::options::TrackerImportOptions;
    use crate::preheat::TrackerPreheat;
    use crate::user::User;
    use crate::validation::{TrackerValidationReport, ValidationErrorReporter, ValidationHook};

    pub const ORG_UNIT: &str = "DiszpKrYNg8";
    pub const PROGRAM: &str = "IpHINAT79UW";
    pub const STAGE: &str = "A03MvHHogjR";
    pub const TET: &str = "nEenWmSyUEp";
    pub const FIRST_NAME: &str = "w75KJ2mc4zz";
    pub const NATIONAL_ID: &str = "AuPLng5hLbE";
    pub const WEIGHT: &str = "UXz7xuGCEhU";
    pub const APGAR: &str = "a3kGcGDCuk6";
    pub const RELATIONSHIP_TYPE: &str = "xLmPUYJX8Ks";

    fn metadata() -> Vec<MetadataObject> {
        vec![
            MetadataObject::OrganisationUnit(Arc::new(OrganisationUnit {
                identity: MetadataIdentity::new(ORG_UNIT, "Ngelehun CHC"),
                path: format!("/ImspTQPwCqd/O6uvpzGd5pu/{}", ORG_UNIT),
                parent: Some("O6uvpzGd5pu".to_string()),
            })),
            MetadataObject::TrackedEntityType(Arc::new(TrackedEntityType {
                identity: MetadataIdentity::new(TET, "Person"),
                attributes: vec![TrackedEntityTypeAttribute {
                    attribute: FIRST_NAME.to_string(),
                    mandatory: true,
                }],
            })),
            MetadataObject::TrackedEntityAttribute(Arc::new(TrackedEntityAttribute {
                identity: MetadataIdentity::new(FIRST_NAME, "First name"),
                ..Default::default()
            })),
            MetadataObject::TrackedEntityAttribute(Arc::new(TrackedEntityAttribute {
                identity: MetadataIdentity::new(NATIONAL_ID, "National identifier"),
                value_type: ValueType::Integer,
                unique: true,
                generated: true,
                pattern: Some(r"^\d{6}$".to_string()),
                ..Default::default()
            })),
            MetadataObject::Program(Arc::new(Program {
                identity: MetadataIdentity::new(PROGRAM, "Child Programme"),
                tracked_entity_type: Some(TET.to_string()),
                program_attributes: vec![
                    ProgramTrackedEntityAttribute {
                        attribute: FIRST_NAME.to_string(),
                        mandatory: true,
                    },
                    ProgramTrackedEntityAttribute {
                        attribute: NATIONAL_ID.to_string(),
                        mandatory: false,
                    },
                ],
                ..Default::default()
            })),
            MetadataObject::ProgramStage(Arc::new(ProgramStage {
                identity: MetadataIdentity::new(STAGE, "Birth"),
                program: PROGRAM.to_string(),
                data_elements: vec![
                    ProgramStageDataElement {
                        data_element: WEIGHT.to_string(),
                        compulsory: true,
                    },
                    ProgramStageDataElement {
                        data_element: APGAR.to_string(),
                        compulsory: false,
                    },
                ],
                ..Default::default()
            })),
            MetadataObject::DataElement(Arc::new(DataElement {
                identity: MetadataIdentity::new(WEIGHT, "Infant weight (g)"),
                value_type: ValueType::IntegerPositive,
            })),
            MetadataObject::DataElement(Arc::new(DataElement {
                identity: MetadataIdentity::new(APGAR, "Apgar score"),
                value_type: ValueType::Integer,
            })),
            MetadataObject::RelationshipType(Arc::new(RelationshipType {
                identity: MetadataIdentity::new(RELATIONSHIP_TYPE, "Mother-Child"),
                ..Default::default()
            })),
        ]
    }

    pub fn user() -> User {
        User::new("M5zQapPyTZI", "nurse").with_organisation_unit("ImspTQPwCqd")
    }

    pub fn preheat() -> TrackerPreheat {
        let mut preheat = TrackerPreheat::new(TrackerIdentifierParams::default());
        preheat.set_user(user());
        preheat.put_metadata(&TrackerIdScheme::Uid, metadata());
        preheat.put_default(MetadataObject::CategoryOptionCombo(Arc::new(
            CategoryOptionCombo {
                identity: MetadataIdentity::new("HllvX50cXC0", "default"),
                ..Default::default()
            },
        )));
        preheat
    }

    /// A converted bundle over `payload` with the fixture metadata.
    pub fn bundle_with(
        payload: TrackerPayload,
        preheat: TrackerPreheat,
        user: User,
        options: TrackerImportOptions,
    ) -> TrackerBundle {
        let mut bundle = TrackerBundle {
            config: BundleConfig {
                user: Arc::new(user),
                options,
            },
            preheat,
            objects: BundleObjects::from_payload(payload),
        };
        bundle.convert();
        bundle
    }

    pub fn bundle(payload: TrackerPayload) -> TrackerBundle {
        bundle_with(payload, preheat(), user(), TrackerImportOptions::default())
    }

    /// Runs a single hook in full mode.
    pub fn run(hook: &dyn ValidationHook, bundle: &TrackerBundle) -> TrackerValidationReport {
        let mut reporter = ValidationErrorReporter::new(false);
        reporter.set_validator(hook.name());
        hook.validate(bundle, &mut reporter);
        reporter.into_report()
    }
}
