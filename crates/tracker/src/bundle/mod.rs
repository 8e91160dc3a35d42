//! The tracker bundle and the stages that consume it.
//!
//! A [`TrackerBundle`] pairs the immutable configuration of an import
//! ([`BundleConfig`]) with the mutable working set the stages pass along
//! ([`BundleObjects`]) and the read-only preheat. Conversion fills the
//! working set's converted objects; validation reads the bundle and may
//! prune invalid objects in per-object atomic mode; commit writes what is
//! left.

mod commit;
mod report;
mod service;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::converter::{
    EnrollmentConverter, EventConverter, RelationshipConverter, TrackedEntityConverter,
    TrackerConverter,
};
use crate::domain::{
    Enrollment, Event, Relationship, TrackedEntity, TrackerDto, TrackerPayload, TrackerType,
};
use crate::model::{
    ProgramInstance, ProgramStageInstance, RelationshipInstance, RuleEffect,
    TrackedEntityInstance,
};
use crate::options::{TrackerImportOptions, TrackerImportStrategy};
use crate::preheat::TrackerPreheat;
use crate::user::User;

pub use commit::TrackerBundleCommitter;
pub use report::{
    CommitFailure, TrackerBundleReport, TrackerImportReport, TrackerSideEffect, TrackerStats,
    TrackerStatus, TrackerTimings, TrackerTypeReport,
};
pub use service::TrackerImportService;

/// Immutable configuration of a bundle.
#[derive(Debug, Clone)]
pub struct BundleConfig {
    /// The acting user.
    pub user: Arc<User>,
    pub options: TrackerImportOptions,
}

impl BundleConfig {
    pub fn strategy(&self) -> TrackerImportStrategy {
        self.options.import_strategy
    }
}

/// Persistable objects produced by conversion, keyed by UID.
#[derive(Debug, Clone, Default)]
pub struct ConvertedObjects {
    pub tracked_entities: HashMap<String, TrackedEntityInstance>,
    pub enrollments: HashMap<String, ProgramInstance>,
    pub events: HashMap<String, ProgramStageInstance>,
    pub relationships: HashMap<String, RelationshipInstance>,
    /// Stored tracked entities outside the bundle whose attributes change
    /// through one of their enrollments.
    pub enrollment_owners: HashMap<String, TrackedEntityInstance>,
}

/// The mutable working set of a bundle.
#[derive(Debug, Clone, Default)]
pub struct BundleObjects {
    pub tracked_entities: Vec<TrackedEntity>,
    pub enrollments: Vec<Enrollment>,
    pub events: Vec<Event>,
    pub relationships: Vec<Relationship>,
    pub converted: ConvertedObjects,
    /// Rule effects per enrollment UID.
    pub enrollment_rule_effects: HashMap<String, Vec<RuleEffect>>,
    /// Rule effects per event UID.
    pub event_rule_effects: HashMap<String, Vec<RuleEffect>>,
}

impl BundleObjects {
    /// Takes the collections of a flattened payload.
    pub fn from_payload(payload: TrackerPayload) -> Self {
        Self {
            tracked_entities: payload.tracked_entities,
            enrollments: payload.enrollments,
            events: payload.events,
            relationships: payload.relationships,
            ..Default::default()
        }
    }
}

/// Everything the stages after preheat work on.
#[derive(Debug)]
pub struct TrackerBundle {
    pub config: BundleConfig,
    pub preheat: TrackerPreheat,
    pub objects: BundleObjects,
}

impl TrackerBundle {
    pub fn user(&self) -> &User {
        &self.config.user
    }

    pub fn strategy(&self) -> TrackerImportStrategy {
        self.config.strategy()
    }

    pub fn tracked_entities(&self) -> &[TrackedEntity] {
        &self.objects.tracked_entities
    }

    pub fn enrollments(&self) -> &[Enrollment] {
        &self.objects.enrollments
    }

    pub fn events(&self) -> &[Event] {
        &self.objects.events
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.objects.relationships
    }

    /// Number of objects of all types in the bundle.
    pub fn bundle_size(&self) -> usize {
        self.objects.tracked_entities.len()
            + self.objects.enrollments.len()
            + self.objects.events.len()
            + self.objects.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundle_size() == 0
    }

    pub fn tracked_entity(&self, uid: &str) -> Option<&TrackedEntity> {
        self.objects.tracked_entities.iter().find(|te| te.uid() == uid)
    }

    pub fn enrollment(&self, uid: &str) -> Option<&Enrollment> {
        self.objects.enrollments.iter().find(|e| e.uid() == uid)
    }

    pub fn event(&self, uid: &str) -> Option<&Event> {
        self.objects.events.iter().find(|e| e.uid() == uid)
    }

    /// Returns `true` if the object is part of this bundle.
    pub fn contains(&self, tracker_type: TrackerType, uid: &str) -> bool {
        match tracker_type {
            TrackerType::TrackedEntity => self.tracked_entity(uid).is_some(),
            TrackerType::Enrollment => self.enrollment(uid).is_some(),
            TrackerType::Event => self.event(uid).is_some(),
            TrackerType::Relationship => {
                self.objects.relationships.iter().any(|r| r.uid() == uid)
            }
        }
    }

    /// Converted tracked entity, from the bundle.
    pub fn tracked_entity_instance(&self, uid: &str) -> Option<&TrackedEntityInstance> {
        self.objects.converted.tracked_entities.get(uid)
    }

    pub fn program_instance(&self, uid: &str) -> Option<&ProgramInstance> {
        self.objects.converted.enrollments.get(uid)
    }

    pub fn program_stage_instance(&self, uid: &str) -> Option<&ProgramStageInstance> {
        self.objects.converted.events.get(uid)
    }

    /// UIDs of the objects of one type, in bundle order.
    pub fn uids(&self, tracker_type: TrackerType) -> Vec<String> {
        fn collect<T: TrackerDto>(objects: &[T]) -> Vec<String> {
            objects.iter().map(|o| o.uid().to_string()).collect()
        }
        match tracker_type {
            TrackerType::TrackedEntity => collect(&self.objects.tracked_entities),
            TrackerType::Enrollment => collect(&self.objects.enrollments),
            TrackerType::Event => collect(&self.objects.events),
            TrackerType::Relationship => collect(&self.objects.relationships),
        }
    }

    /// Converts every wire object into its persistable form.
    pub fn convert(&mut self) {
        let preheat = &self.preheat;
        let objects = &mut self.objects;
        objects.converted = ConvertedObjects {
            tracked_entities: objects
                .tracked_entities
                .iter()
                .map(|te| (te.uid().to_string(), TrackedEntityConverter.from(preheat, te)))
                .collect(),
            enrollments: objects
                .enrollments
                .iter()
                .map(|e| (e.uid().to_string(), EnrollmentConverter.from(preheat, e)))
                .collect(),
            events: objects
                .events
                .iter()
                .map(|e| (e.uid().to_string(), EventConverter.from(preheat, e)))
                .collect(),
            relationships: objects
                .relationships
                .iter()
                .map(|r| (r.uid().to_string(), RelationshipConverter.from(preheat, r)))
                .collect(),
            enrollment_owners: HashMap::new(),
        };

        // Events of enrollments created in this bundle take their enrollment's
        // tracked entity and state from the converted enrollment.
        let converted = &mut objects.converted;
        for psi in converted.events.values_mut() {
            let Some(pi) = psi
                .program_instance
                .as_deref()
                .and_then(|uid| converted.enrollments.get(uid))
            else {
                continue;
            };
            if psi.tracked_entity_instance.is_none() {
                psi.tracked_entity_instance = pi.entity_instance.clone();
            }
            psi.enrollment_status = Some(pi.status);
            psi.follow_up = pi.follow_up;
        }
    }

    /// Moves enrollment attributes onto the enrollment's tracked entity.
    ///
    /// The converted tracked entity takes them when it is in the bundle.
    /// Otherwise a copy of the stored one does, kept in
    /// [`ConvertedObjects::enrollment_owners`]. Deletions carry no attributes.
    pub fn merge_enrollment_attributes(&mut self) {
        if self.strategy().is_delete() {
            return;
        }
        let preheat = &self.preheat;
        let objects = &mut self.objects;
        for enrollment in &objects.enrollments {
            if enrollment.attributes.is_empty() || enrollment.is_deleted() {
                continue;
            }
            let Some(uid) = enrollment.tracked_entity.as_deref() else {
                continue;
            };
            let converted = &mut objects.converted;
            let tei = match converted.tracked_entities.get_mut(uid) {
                Some(tei) => tei,
                None => {
                    let Some(stored) = preheat.get_tracked_entity(uid) else {
                        continue;
                    };
                    converted
                        .enrollment_owners
                        .entry(uid.to_string())
                        .or_insert_with(|| stored.clone())
                }
            };
            TrackedEntityConverter.merge_attributes(
                preheat,
                &mut tei.attribute_values,
                &enrollment.attributes,
            );
        }
    }

    /// Removes `invalid` objects and everything that depends on them.
    ///
    /// Enrollments of a removed tracked entity, events of a removed
    /// enrollment and relationships pointing at any removed object go as
    /// well. Returns every removed object.
    pub fn remove_invalid(
        &mut self,
        invalid: &HashSet<(TrackerType, String)>,
    ) -> Vec<(TrackerType, String)> {
        let mut removed: HashSet<(TrackerType, String)> = invalid.clone();
        let is_removed = |removed: &HashSet<(TrackerType, String)>, t: TrackerType, uid: Option<&String>| {
            uid.is_some_and(|uid| removed.contains(&(t, uid.clone())))
        };

        for enrollment in &self.objects.enrollments {
            if is_removed(&removed, TrackerType::TrackedEntity, enrollment.tracked_entity.as_ref()) {
                removed.insert((TrackerType::Enrollment, enrollment.uid().to_string()));
            }
        }
        for event in &self.objects.events {
            if is_removed(&removed, TrackerType::Enrollment, event.enrollment.as_ref()) {
                removed.insert((TrackerType::Event, event.uid().to_string()));
            }
        }
        for relationship in &self.objects.relationships {
            let dangling = [relationship.from.as_ref(), relationship.to.as_ref()]
                .into_iter()
                .flatten()
                .filter_map(|item| item.target())
                .any(|(t, uid)| removed.contains(&(t, uid.to_string())));
            if dangling {
                removed.insert((TrackerType::Relationship, relationship.uid().to_string()));
            }
        }

        let keep = |t: TrackerType, uid: &str| !removed.contains(&(t, uid.to_string()));
        let objects = &mut self.objects;
        objects
            .tracked_entities
            .retain(|o| keep(TrackerType::TrackedEntity, o.uid()));
        objects.enrollments.retain(|o| keep(TrackerType::Enrollment, o.uid()));
        objects.events.retain(|o| keep(TrackerType::Event, o.uid()));
        objects
            .relationships
            .retain(|o| keep(TrackerType::Relationship, o.uid()));
        let converted = &mut objects.converted;
        converted
            .tracked_entities
            .retain(|uid, _| keep(TrackerType::TrackedEntity, uid));
        converted.enrollments.retain(|uid, _| keep(TrackerType::Enrollment, uid));
        converted.events.retain(|uid, _| keep(TrackerType::Event, uid));
        converted
            .relationships
            .retain(|uid, _| keep(TrackerType::Relationship, uid));

        let mut removed: Vec<_> = removed.into_iter().collect();
        removed.sort();
        removed
    }
}
