//! Metadata, users and payload builders.

#![allow(dead_code)]

use std::sync::Arc;

use dhis_tracker::domain::{Attribute, DataValue};
use dhis_tracker::model::{
    CategoryOptionCombo, DataElement, MetadataIdentity, MetadataObject, OrganisationUnit, Program,
    ProgramStage, ProgramStageDataElement, ProgramTrackedEntityAttribute, RelationshipType,
    TrackedEntityAttribute, TrackedEntityType, TrackedEntityTypeAttribute, ValueType,
};
use dhis_tracker::store::TrackerStore;
use dhis_tracker::user::{AUTHORITY_ALL, AUTHORITY_IGNORE_REQUIRED_VALUE_VALIDATION};
use dhis_tracker::{
    Enrollment, Event, InMemoryTrackerStore, TrackedEntity, TrackerImportOptions,
    TrackerImportParams, TrackerPayload, User,
};

// ============================================================================
// Metadata
// ============================================================================

pub const ROOT_ORG_UNIT: &str = "ImspTQPwCqd";
pub const ORG_UNIT: &str = "DiszpKrYNg8";
pub const OTHER_ORG_UNIT: &str = "g8upMTyEZGZ";
pub const PROGRAM: &str = "IpHINAT79UW";
pub const STAGE: &str = "A03MvHHogjR";
pub const TET: &str = "nEenWmSyUEp";
pub const FIRST_NAME: &str = "w75KJ2mc4zz";
pub const NATIONAL_ID: &str = "AuPLng5hLbE";
pub const WEIGHT: &str = "UXz7xuGCEhU";
pub const APGAR: &str = "a3kGcGDCuk6";
pub const RELATIONSHIP_TYPE: &str = "xLmPUYJX8Ks";
pub const DEFAULT_COC: &str = "HllvX50cXC0";

fn org_unit(uid: &str, name: &str, parent: Option<&str>, path: &str) -> MetadataObject {
    MetadataObject::OrganisationUnit(Arc::new(OrganisationUnit {
        identity: MetadataIdentity::new(uid, name).with_code(format!("OU_{}", uid)),
        path: path.to_string(),
        parent: parent.map(str::to_string),
    }))
}

/// The metadata every test store is seeded with.
pub fn metadata() -> Vec<MetadataObject> {
    vec![
        org_unit(ROOT_ORG_UNIT, "Sierra Leone", None, "/ImspTQPwCqd"),
        org_unit(ORG_UNIT, "Ngelehun CHC", Some("O6uvpzGd5pu"), "/ImspTQPwCqd/O6uvpzGd5pu/DiszpKrYNg8"),
        org_unit(OTHER_ORG_UNIT, "Elsewhere", Some("zFDYIgyGmXG"), "/zFDYIgyGmXG/g8upMTyEZGZ"),
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
            ..Default::default()
        })),
        MetadataObject::Program(Arc::new(Program {
            identity: MetadataIdentity::new(PROGRAM, "Child Programme").with_code("CHILD"),
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
        MetadataObject::CategoryOptionCombo(Arc::new(CategoryOptionCombo {
            identity: MetadataIdentity::new(DEFAULT_COC, "default"),
            ..Default::default()
        })),
    ]
}

// ============================================================================
// Users
// ============================================================================

/// A superuser.
pub fn admin() -> User {
    User::new("xE7jOejl9FI", "admin").with_authority(AUTHORITY_ALL)
}

/// A data entry user capturing in the root organisation unit.
pub fn nurse() -> User {
    User::new("M5zQapPyTZI", "nurse").with_organisation_unit(ROOT_ORG_UNIT)
}

/// A data entry user allowed to skip mandatory attributes.
pub fn supervisor() -> User {
    User::new("DXyJmlo9rge", "supervisor")
        .with_organisation_unit(ROOT_ORG_UNIT)
        .with_authority(AUTHORITY_IGNORE_REQUIRED_VALUE_VALIDATION)
}

/// A data entry user capturing in an unrelated organisation unit.
pub fn outsider() -> User {
    User::new("PhzytPW3g2J", "outsider").with_organisation_unit(OTHER_ORG_UNIT)
}

/// Saves the shared metadata and users.
pub async fn seed(store: &dyn TrackerStore) {
    for object in metadata() {
        store.save_metadata(object).await.unwrap();
    }
    for user in [admin(), nurse(), supervisor(), outsider()] {
        store.save_user(user).await.unwrap();
    }
}

/// A seeded in-memory store.
pub async fn memory_store() -> Arc<InMemoryTrackerStore> {
    let store = Arc::new(InMemoryTrackerStore::new());
    seed(store.as_ref()).await;
    store
}

// ============================================================================
// Payloads
// ============================================================================

pub fn tracked_entity(uid: &str) -> TrackedEntity {
    TrackedEntity {
        tracked_entity_type: Some(TET.to_string()),
        org_unit: Some(ORG_UNIT.to_string()),
        attributes: vec![Attribute::new(FIRST_NAME, "Jane")],
        ..TrackedEntity::new(uid)
    }
}

pub fn enrollment(uid: &str, tracked_entity: &str) -> Enrollment {
    Enrollment {
        tracked_entity: Some(tracked_entity.to_string()),
        program: Some(PROGRAM.to_string()),
        org_unit: Some(ORG_UNIT.to_string()),
        enrolled_at: Some("2021-03-01T10:00:00".to_string()),
        occurred_at: Some("2021-03-01T10:00:00".to_string()),
        ..Enrollment::new(uid)
    }
}

pub fn event(uid: &str, enrollment: &str) -> Event {
    Event {
        enrollment: Some(enrollment.to_string()),
        program: Some(PROGRAM.to_string()),
        program_stage: Some(STAGE.to_string()),
        org_unit: Some(ORG_UNIT.to_string()),
        occurred_at: Some("2021-03-02T09:30:00".to_string()),
        data_values: vec![DataValue::new(WEIGHT, "3200"), DataValue::new(APGAR, "8")],
        ..Event::new(uid)
    }
}

pub const TEI: &str = "IOR1AXXl24H";
pub const ENROLLMENT: &str = "MNWZ6hnuhSw";
pub const EVENTS: [&str; 3] = ["ZwwuwNp6gVd", "XwwuwNp6gVd", "YwwuwNp6gVd"];

/// One tracked entity, one enrollment and three events, flat.
pub fn three_events() -> TrackerPayload {
    TrackerPayload {
        tracked_entities: vec![tracked_entity(TEI)],
        enrollments: vec![enrollment(ENROLLMENT, TEI)],
        events: EVENTS.iter().map(|uid| event(uid, ENROLLMENT)).collect(),
        ..Default::default()
    }
}

pub fn params(user: &User, payload: TrackerPayload, options: TrackerImportOptions) -> TrackerImportParams {
    TrackerImportParams::new(user.username.clone(), payload).with_options(options)
}
