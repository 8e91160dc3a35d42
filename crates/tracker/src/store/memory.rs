//! In-memory tracker store.
//!
//! Reads work on a cloned snapshot of the state. Writers are serialized by a
//! lock held for the lifetime of the transaction and work on a private copy
//! that replaces the shared state on commit.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::{
    DEFAULT_NAME, Persistable, TrackerReader, TrackerStore, TrackerTransaction,
    UniqueAttributeValue, WriteOperation, WriteOutcome, matches_scheme,
};
use crate::domain::TrackerType;
use crate::error::{BackendError, CommitError, StorageError, StorageResult};
use crate::identifier::{Identifiable, TrackerIdScheme};
use crate::model::{
    MetadataKind, MetadataObject, ProgramInstance, ProgramStageInstance, ProgramType,
    RelationshipInstance, TrackedEntityInstance,
};
use crate::user::User;

#[derive(Debug, Clone, Default)]
struct StoreData {
    metadata: BTreeMap<(MetadataKind, String), MetadataObject>,
    tracked_entities: HashMap<String, TrackedEntityInstance>,
    enrollments: HashMap<String, ProgramInstance>,
    events: HashMap<String, ProgramStageInstance>,
    relationships: HashMap<String, RelationshipInstance>,
}

impl StoreData {
    fn contains(&self, tracker_type: TrackerType, uid: &str) -> bool {
        match tracker_type {
            TrackerType::TrackedEntity => self.tracked_entities.contains_key(uid),
            TrackerType::Enrollment => self.enrollments.contains_key(uid),
            TrackerType::Event => self.events.contains_key(uid),
            TrackerType::Relationship => self.relationships.contains_key(uid),
        }
    }

    fn put(&mut self, object: Persistable) {
        match object {
            Persistable::TrackedEntity(o) => {
                self.tracked_entities.insert(o.uid.clone(), o);
            }
            Persistable::Enrollment(o) => {
                self.enrollments.insert(o.uid.clone(), o);
            }
            Persistable::Event(o) => {
                self.events.insert(o.uid.clone(), o);
            }
            Persistable::Relationship(o) => {
                self.relationships.insert(o.uid.clone(), o);
            }
        }
    }

    fn mark_deleted(&mut self, tracker_type: TrackerType, uid: &str) -> bool {
        let flag = match tracker_type {
            TrackerType::TrackedEntity => self.tracked_entities.get_mut(uid).map(|o| &mut o.deleted),
            TrackerType::Enrollment => self.enrollments.get_mut(uid).map(|o| &mut o.deleted),
            TrackerType::Event => self.events.get_mut(uid).map(|o| &mut o.deleted),
            TrackerType::Relationship => self.relationships.get_mut(uid).map(|o| &mut o.deleted),
        };
        match flag {
            Some(deleted) => {
                *deleted = true;
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, operation: &WriteOperation) -> StorageResult<()> {
        let tracker_type = operation.tracker_type();
        let uid = operation.uid();
        match operation {
            WriteOperation::Create(object) => {
                if self.contains(tracker_type, uid) {
                    return Err(StorageError::AlreadyExists {
                        tracker_type,
                        uid: uid.to_string(),
                    });
                }
                self.put(object.clone());
            }
            WriteOperation::Update(object) => {
                if !self.contains(tracker_type, uid) {
                    return Err(StorageError::NotFound {
                        tracker_type,
                        uid: uid.to_string(),
                    });
                }
                self.put(object.clone());
            }
            WriteOperation::Delete { .. } => {
                if !self.mark_deleted(tracker_type, uid) {
                    return Err(StorageError::NotFound {
                        tracker_type,
                        uid: uid.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A tracker store kept in process memory.
///
/// Intended for tests and tooling. Writes to selected objects can be made to
/// fail with [`InMemoryTrackerStore::fail_on`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryTrackerStore {
    data: Arc<RwLock<StoreData>>,
    writer: Arc<Mutex<()>>,
    failures: Arc<RwLock<HashSet<(TrackerType, String)>>>,
}

impl InMemoryTrackerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write to the given object fail.
    pub fn fail_on(&self, tracker_type: TrackerType, uid: impl Into<String>) {
        self.failures.write().insert((tracker_type, uid.into()));
    }

    /// Number of stored objects of a type, soft-deleted ones included.
    pub fn count(&self, tracker_type: TrackerType) -> usize {
        let data = self.data.read();
        match tracker_type {
            TrackerType::TrackedEntity => data.tracked_entities.len(),
            TrackerType::Enrollment => data.enrollments.len(),
            TrackerType::Event => data.events.len(),
            TrackerType::Relationship => data.relationships.len(),
        }
    }

    /// Returns a stored event.
    pub fn event(&self, uid: &str) -> Option<ProgramStageInstance> {
        self.data.read().events.get(uid).cloned()
    }

    /// Returns a stored enrollment.
    pub fn enrollment(&self, uid: &str) -> Option<ProgramInstance> {
        self.data.read().enrollments.get(uid).cloned()
    }

    /// Returns a stored tracked entity.
    pub fn tracked_entity(&self, uid: &str) -> Option<TrackedEntityInstance> {
        self.data.read().tracked_entities.get(uid).cloned()
    }

    /// Returns a stored relationship.
    pub fn relationship(&self, uid: &str) -> Option<RelationshipInstance> {
        self.data.read().relationships.get(uid).cloned()
    }

    /// Stores tracker objects directly, bypassing the pipeline.
    pub fn seed(&self, objects: impl IntoIterator<Item = Persistable>) {
        let mut data = self.data.write();
        for object in objects {
            data.put(object);
        }
    }
}

#[async_trait]
impl TrackerStore for InMemoryTrackerStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn begin_read(&self) -> StorageResult<Box<dyn TrackerReader>> {
        Ok(Box::new(InMemoryReader {
            data: self.data.read().clone(),
        }))
    }

    async fn begin_write(&self) -> StorageResult<Box<dyn TrackerTransaction>> {
        let guard = self.writer.clone().lock_owned().await;
        let working = self.data.read().clone();
        Ok(Box::new(InMemoryTransaction {
            store: self.clone(),
            working,
            staged: Vec::new(),
            guard: Some(guard),
        }))
    }

    async fn save_metadata(&self, object: MetadataObject) -> StorageResult<()> {
        let key = (object.kind(), object.uid().to_string());
        self.data.write().metadata.insert(key, object);
        Ok(())
    }

    async fn save_user(&self, user: User) -> StorageResult<()> {
        self.save_metadata(MetadataObject::User(Arc::new(user))).await
    }
}

struct InMemoryReader {
    data: StoreData,
}

impl InMemoryReader {
    fn metadata_of(&self, kind: MetadataKind) -> impl Iterator<Item = &MetadataObject> {
        self.data
            .metadata
            .range((kind, String::new())..)
            .take_while(move |((k, _), _)| *k == kind)
            .map(|(_, object)| object)
    }
}

fn select<T: Clone>(map: &HashMap<String, T>, uids: &[String]) -> Vec<T> {
    uids.iter().filter_map(|uid| map.get(uid).cloned()).collect()
}

#[async_trait]
impl TrackerReader for InMemoryReader {
    async fn defaults(&self) -> StorageResult<Vec<MetadataObject>> {
        Ok(self
            .data
            .metadata
            .values()
            .filter(|object| object.name() == Some(DEFAULT_NAME))
            .filter(|object| object.kind() != MetadataKind::User)
            .cloned()
            .collect())
    }

    async fn find_user(&self, id: &str) -> StorageResult<Option<User>> {
        Ok(self.metadata_of(MetadataKind::User).find_map(|object| match object {
            MetadataObject::User(user) if user.uid == id || user.username == id => {
                Some(user.as_ref().clone())
            }
            _ => None,
        }))
    }

    async fn find_metadata(
        &self,
        kind: MetadataKind,
        scheme: &TrackerIdScheme,
        values: &[String],
    ) -> StorageResult<Vec<MetadataObject>> {
        Ok(self
            .metadata_of(kind)
            .filter(|object| matches_scheme(object, scheme, values))
            .cloned()
            .collect())
    }

    async fn all_metadata(&self, kind: MetadataKind) -> StorageResult<Vec<MetadataObject>> {
        Ok(self.metadata_of(kind).cloned().collect())
    }

    async fn find_tracked_entities(
        &self,
        uids: &[String],
    ) -> StorageResult<Vec<TrackedEntityInstance>> {
        Ok(select(&self.data.tracked_entities, uids))
    }

    async fn find_enrollments(&self, uids: &[String]) -> StorageResult<Vec<ProgramInstance>> {
        Ok(select(&self.data.enrollments, uids))
    }

    async fn find_events(&self, uids: &[String]) -> StorageResult<Vec<ProgramStageInstance>> {
        Ok(select(&self.data.events, uids))
    }

    async fn find_relationships(
        &self,
        uids: &[String],
    ) -> StorageResult<Vec<RelationshipInstance>> {
        Ok(select(&self.data.relationships, uids))
    }

    async fn find_program_instances_without_registration(
        &self,
        programs: &[String],
    ) -> StorageResult<Vec<ProgramInstance>> {
        Ok(self
            .data
            .enrollments
            .values()
            .filter(|pi| !pi.deleted)
            .filter(|pi| {
                pi.program.as_ref().is_some_and(|program| {
                    program.program_type == ProgramType::WithoutRegistration
                        && programs.contains(&program.identity.uid)
                })
            })
            .cloned()
            .collect())
    }

    async fn find_attribute_values(
        &self,
        attributes: &[String],
        values: &[String],
    ) -> StorageResult<Vec<UniqueAttributeValue>> {
        let mut found = Vec::new();
        for tei in self.data.tracked_entities.values().filter(|tei| !tei.deleted) {
            for av in &tei.attribute_values {
                let Some(value) = av.value.as_ref() else {
                    continue;
                };
                if attributes.contains(&av.attribute) && values.contains(value) {
                    found.push(UniqueAttributeValue {
                        attribute: av.attribute.clone(),
                        value: value.clone(),
                        tracked_entity: tei.uid.clone(),
                        org_unit: tei
                            .organisation_unit
                            .as_ref()
                            .map(|ou| ou.identity.uid.clone()),
                    });
                }
            }
        }
        Ok(found)
    }
}

struct InMemoryTransaction {
    store: InMemoryTrackerStore,
    working: StoreData,
    staged: Vec<WriteOperation>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InMemoryTransaction {
    fn ensure_active(&self) -> StorageResult<()> {
        if self.guard.is_none() {
            return Err(StorageError::Backend(BackendError::Internal {
                backend_name: "memory".to_string(),
                message: CommitError::InvalidTransaction.to_string(),
                source: None,
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl TrackerTransaction for InMemoryTransaction {
    fn stage(&mut self, operation: WriteOperation) {
        self.staged.push(operation);
    }

    fn pending(&self) -> usize {
        self.staged.len()
    }

    async fn flush(&mut self) -> StorageResult<Vec<WriteOutcome>> {
        self.ensure_active()?;
        let staged = std::mem::take(&mut self.staged);
        let mut outcomes = Vec::with_capacity(staged.len());
        for operation in &staged {
            let injected = self
                .store
                .failures
                .read()
                .contains(&(operation.tracker_type(), operation.uid().to_string()));
            let result = if injected {
                Err(StorageError::Backend(BackendError::Internal {
                    backend_name: "memory".to_string(),
                    message: format!("injected write failure for {}", operation.uid()),
                    source: None,
                }))
            } else {
                self.working.apply(operation)
            };
            match result {
                Ok(()) => outcomes.push(WriteOutcome::applied(operation)),
                Err(err) => {
                    debug!(uid = operation.uid(), error = %err, "Staged write failed");
                    outcomes.push(WriteOutcome::failed(operation, err));
                }
            }
        }
        Ok(outcomes)
    }

    async fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.ensure_active()?;
        let working = std::mem::take(&mut self.working);
        let mut data = self.store.data.write();
        // Metadata may have been saved while the transaction was open.
        let metadata = std::mem::take(&mut data.metadata);
        *data = StoreData { metadata, ..working };
        drop(data);
        self.guard = None;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> StorageResult<()> {
        self.ensure_active()?;
        self.staged.clear();
        self.guard = None;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.guard.is_some()
    }
}
