//! The preheat cache and the supplier chain that fills it.
//!
//! Everything the converters and validation hooks look up is loaded here in
//! bulk, once per import, from a single read snapshot. After the preheat
//! stage the cache is read-only. Absence of an object is an expected outcome
//! and every consumer must check for it.

mod service;
mod supplier;
pub mod suppliers;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::domain::TrackerType;
use crate::identifier::{Identifiable, TrackerIdScheme, TrackerIdentifierParams};
use crate::model::{
    MetadataKind, MetadataObject, MetadataType, ProgramInstance, ProgramStageInstance,
    RelationshipInstance, TrackedEntityInstance,
};
use crate::store::UniqueAttributeValue;
use crate::user::User;

pub use service::{PreheatConfig, TrackerPreheatService};
pub use supplier::PreheatSupplier;

/// A supplier that failed during a best-effort preheat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedSupplier {
    pub supplier: String,
    pub message: String,
}

/// Bulk-loaded state for one import.
#[derive(Debug, Default)]
pub struct TrackerPreheat {
    identifiers: TrackerIdentifierParams,
    user: Option<Arc<User>>,
    metadata: HashMap<(TrackerIdScheme, MetadataKind), HashMap<String, MetadataObject>>,
    defaults: HashMap<MetadataKind, MetadataObject>,
    tracked_entities: HashMap<String, TrackedEntityInstance>,
    enrollments: HashMap<String, ProgramInstance>,
    events: HashMap<String, ProgramStageInstance>,
    relationships: HashMap<String, RelationshipInstance>,
    program_instances_without_registration: HashMap<String, ProgramInstance>,
    unique_attribute_values: Vec<UniqueAttributeValue>,
    failed_suppliers: Vec<FailedSupplier>,
}

impl TrackerPreheat {
    pub fn new(identifiers: TrackerIdentifierParams) -> Self {
        Self {
            identifiers,
            ..Default::default()
        }
    }

    /// Identifier schemes the payload references are expressed in.
    pub fn identifiers(&self) -> &TrackerIdentifierParams {
        &self.identifiers
    }

    pub fn user(&self) -> Option<&Arc<User>> {
        self.user.as_ref()
    }

    pub fn set_user(&mut self, user: User) {
        self.user = Some(Arc::new(user));
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Looks up a metadata object by its identifier under `scheme`.
    pub fn get<T: MetadataType>(&self, scheme: &TrackerIdScheme, value: &str) -> Option<Arc<T>> {
        self.metadata
            .get(&(scheme.clone(), T::KIND))
            .and_then(|objects| objects.get(value))
            .and_then(T::unwrap)
            .cloned()
    }

    /// Resolves a payload reference using the scheme configured for `T`.
    pub fn resolve<T: MetadataType>(&self, reference: Option<&str>) -> Option<Arc<T>> {
        let reference = reference.filter(|r| !r.is_empty())?;
        self.get::<T>(self.identifiers.scheme_for(T::KIND), reference)
    }

    /// Looks up a metadata object by UID.
    pub fn get_by_uid<T: MetadataType>(&self, uid: &str) -> Option<Arc<T>> {
        self.get::<T>(&TrackerIdScheme::Uid, uid)
    }

    /// The default object of a type (default category option combo, ...).
    pub fn get_default<T: MetadataType>(&self) -> Option<Arc<T>> {
        self.defaults.get(&T::KIND).and_then(T::unwrap).cloned()
    }

    pub fn put_default(&mut self, object: MetadataObject) {
        self.defaults.insert(object.kind(), object);
    }

    /// Adds metadata loaded under `scheme`.
    ///
    /// Objects are always indexed by UID as well, so references held by
    /// stored objects and metadata can be followed.
    pub fn put_metadata(&mut self, scheme: &TrackerIdScheme, objects: Vec<MetadataObject>) {
        for object in objects {
            let kind = object.kind();
            if *scheme != TrackerIdScheme::Uid {
                if let Some(identifier) = object.identify(scheme) {
                    self.metadata
                        .entry((scheme.clone(), kind))
                        .or_default()
                        .insert(identifier, object.clone());
                }
            }
            self.metadata
                .entry((TrackerIdScheme::Uid, kind))
                .or_default()
                .insert(object.uid().to_string(), object);
        }
    }

    /// Every loaded object of type `T`.
    pub fn all<T: MetadataType>(&self) -> Vec<Arc<T>> {
        self.metadata
            .get(&(TrackerIdScheme::Uid, T::KIND))
            .map(|objects| objects.values().filter_map(T::unwrap).cloned().collect())
            .unwrap_or_default()
    }

    // ========================================================================
    // Tracker objects
    // ========================================================================

    pub fn get_tracked_entity(&self, uid: &str) -> Option<&TrackedEntityInstance> {
        self.tracked_entities.get(uid)
    }

    pub fn get_enrollment(&self, uid: &str) -> Option<&ProgramInstance> {
        self.enrollments.get(uid)
    }

    pub fn get_event(&self, uid: &str) -> Option<&ProgramStageInstance> {
        self.events.get(uid)
    }

    pub fn get_relationship(&self, uid: &str) -> Option<&RelationshipInstance> {
        self.relationships.get(uid)
    }

    /// Returns `true` if a stored object of the type exists, deleted or not.
    pub fn exists(&self, tracker_type: TrackerType, uid: &str) -> bool {
        self.is_deleted(tracker_type, uid).is_some()
    }

    /// `Some(deleted flag)` for stored objects, `None` when not stored.
    pub fn is_deleted(&self, tracker_type: TrackerType, uid: &str) -> Option<bool> {
        match tracker_type {
            TrackerType::TrackedEntity => self.tracked_entities.get(uid).map(|o| o.deleted),
            TrackerType::Enrollment => self.enrollments.get(uid).map(|o| o.deleted),
            TrackerType::Event => self.events.get(uid).map(|o| o.deleted),
            TrackerType::Relationship => self.relationships.get(uid).map(|o| o.deleted),
        }
    }

    pub fn put_tracked_entities(&mut self, objects: Vec<TrackedEntityInstance>) {
        self.tracked_entities
            .extend(objects.into_iter().map(|o| (o.uid.clone(), o)));
    }

    pub fn put_enrollments(&mut self, objects: Vec<ProgramInstance>) {
        self.enrollments
            .extend(objects.into_iter().map(|o| (o.uid.clone(), o)));
    }

    pub fn put_events(&mut self, objects: Vec<ProgramStageInstance>) {
        self.events.extend(objects.into_iter().map(|o| (o.uid.clone(), o)));
    }

    pub fn put_relationships(&mut self, objects: Vec<RelationshipInstance>) {
        self.relationships
            .extend(objects.into_iter().map(|o| (o.uid.clone(), o)));
    }

    /// The single enrollment of a program without registration.
    pub fn program_instance_without_registration(&self, program: &str) -> Option<&ProgramInstance> {
        self.program_instances_without_registration.get(program)
    }

    pub fn put_program_instances_without_registration(&mut self, objects: Vec<ProgramInstance>) {
        for pi in objects {
            if let Some(program) = pi.program.as_ref() {
                self.program_instances_without_registration
                    .insert(program.identity.uid.clone(), pi);
            }
        }
    }

    // ========================================================================
    // Attribute values and diagnostics
    // ========================================================================

    /// Stored values of unique attributes that also occur in the payload.
    pub fn unique_attribute_values(&self) -> &[UniqueAttributeValue] {
        &self.unique_attribute_values
    }

    pub fn put_unique_attribute_values(&mut self, values: Vec<UniqueAttributeValue>) {
        self.unique_attribute_values.extend(values);
    }

    /// Suppliers that failed during a best-effort preheat.
    pub fn failed_suppliers(&self) -> &[FailedSupplier] {
        &self.failed_suppliers
    }

    pub fn record_failure(&mut self, supplier: &str, message: impl Into<String>) {
        self.failed_suppliers.push(FailedSupplier {
            supplier: supplier.to_string(),
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategoryOptionCombo, MetadataIdentity, OrganisationUnit, Program};

    fn unit(uid: &str, code: &str) -> MetadataObject {
        MetadataObject::OrganisationUnit(Arc::new(OrganisationUnit {
            identity: MetadataIdentity::new(uid, uid).with_code(code),
            ..Default::default()
        }))
    }

    #[test]
    fn test_get_by_scheme_and_uid() {
        let mut preheat = TrackerPreheat::new(TrackerIdentifierParams {
            org_unit_id_scheme: Some(TrackerIdScheme::Code),
            ..Default::default()
        });
        preheat.put_metadata(&TrackerIdScheme::Code, vec![unit("DiszpKrYNg8", "OU_559")]);

        assert!(preheat.resolve::<OrganisationUnit>(Some("OU_559")).is_some());
        assert!(preheat.resolve::<OrganisationUnit>(Some("DiszpKrYNg8")).is_none());
        assert!(preheat.get_by_uid::<OrganisationUnit>("DiszpKrYNg8").is_some());
        assert!(preheat.resolve::<Program>(Some("OU_559")).is_none());
        assert!(preheat.resolve::<OrganisationUnit>(None).is_none());
    }

    #[test]
    fn test_defaults() {
        let mut preheat = TrackerPreheat::default();
        assert!(preheat.get_default::<CategoryOptionCombo>().is_none());
        preheat.put_default(MetadataObject::CategoryOptionCombo(Arc::new(CategoryOptionCombo {
            identity: MetadataIdentity::new("HllvX50cXC0", "default"),
            ..Default::default()
        })));
        assert_eq!(
            preheat.get_default::<CategoryOptionCombo>().unwrap().identity.uid,
            "HllvX50cXC0"
        );
    }

    #[test]
    fn test_record_failure() {
        let mut preheat = TrackerPreheat::default();
        preheat.record_failure("EventSupplier", "database is locked");
        assert_eq!(preheat.failed_suppliers()[0].supplier, "EventSupplier");
    }
}
