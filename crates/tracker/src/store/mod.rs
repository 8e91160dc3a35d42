//! Storage boundary of the import pipeline.
//!
//! The pipeline reads through a [`TrackerReader`] (one consistent snapshot for
//! the whole preheat) and writes through a [`TrackerTransaction`] scoped to
//! the bundle being committed. Both are handed out by a [`TrackerStore`].
//!
//! # Backends
//!
//! | Backend | Snapshot reads | Per-operation atomicity |
//! |---------|----------------|-------------------------|
//! | [`InMemoryTrackerStore`] | cloned state | staged copy |
//! | `SqliteTrackerStore` | deferred `BEGIN` | `SAVEPOINT` |

mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::TrackerType;
use crate::error::StorageResult;
use crate::identifier::TrackerIdScheme;
use crate::model::{
    MetadataKind, MetadataObject, ProgramInstance, ProgramStageInstance, RelationshipInstance,
    TrackedEntityInstance,
};
use crate::user::User;

pub use memory::InMemoryTrackerStore;
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteStoreConfig, SqliteTrackerStore};

/// Name of the default metadata objects (default category option combo, ...).
pub const DEFAULT_NAME: &str = "default";

/// A stored value of a unique tracked entity attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueAttributeValue {
    pub attribute: String,
    pub value: String,
    /// Tracked entity holding the value.
    pub tracked_entity: String,
    /// Organisation unit of that tracked entity.
    pub org_unit: Option<String>,
}

/// A persistable object produced by conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum Persistable {
    TrackedEntity(TrackedEntityInstance),
    Enrollment(ProgramInstance),
    Event(ProgramStageInstance),
    Relationship(RelationshipInstance),
}

impl Persistable {
    pub fn tracker_type(&self) -> TrackerType {
        match self {
            Persistable::TrackedEntity(_) => TrackerType::TrackedEntity,
            Persistable::Enrollment(_) => TrackerType::Enrollment,
            Persistable::Event(_) => TrackerType::Event,
            Persistable::Relationship(_) => TrackerType::Relationship,
        }
    }

    pub fn uid(&self) -> &str {
        match self {
            Persistable::TrackedEntity(object) => &object.uid,
            Persistable::Enrollment(object) => &object.uid,
            Persistable::Event(object) => &object.uid,
            Persistable::Relationship(object) => &object.uid,
        }
    }
}

/// Kind of write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteAction::Create => write!(f, "create"),
            WriteAction::Update => write!(f, "update"),
            WriteAction::Delete => write!(f, "delete"),
        }
    }
}

/// A write staged on a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOperation {
    /// Inserts a new object. Fails if the UID is taken.
    Create(Persistable),
    /// Replaces an existing object. Fails if it does not exist.
    Update(Persistable),
    /// Soft-deletes an object. Fails if it does not exist.
    Delete { tracker_type: TrackerType, uid: String },
}

impl WriteOperation {
    pub fn action(&self) -> WriteAction {
        match self {
            WriteOperation::Create(_) => WriteAction::Create,
            WriteOperation::Update(_) => WriteAction::Update,
            WriteOperation::Delete { .. } => WriteAction::Delete,
        }
    }

    pub fn tracker_type(&self) -> TrackerType {
        match self {
            WriteOperation::Create(object) | WriteOperation::Update(object) => {
                object.tracker_type()
            }
            WriteOperation::Delete { tracker_type, .. } => *tracker_type,
        }
    }

    pub fn uid(&self) -> &str {
        match self {
            WriteOperation::Create(object) | WriteOperation::Update(object) => object.uid(),
            WriteOperation::Delete { uid, .. } => uid,
        }
    }
}

/// The result of applying one staged write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub tracker_type: TrackerType,
    pub uid: String,
    pub action: WriteAction,
    /// Failure message. `None` when the write was applied.
    pub error: Option<String>,
}

impl WriteOutcome {
    pub fn applied(operation: &WriteOperation) -> Self {
        Self {
            tracker_type: operation.tracker_type(),
            uid: operation.uid().to_string(),
            action: operation.action(),
            error: None,
        }
    }

    pub fn failed(operation: &WriteOperation, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::applied(operation)
        }
    }

    pub fn is_applied(&self) -> bool {
        self.error.is_none()
    }
}

/// A consistent read view used by the preheat stage.
///
/// Every lookup is a bulk lookup: one call per referenced set of identifiers.
/// Soft-deleted tracker objects are returned with their `deleted` flag set.
#[async_trait]
pub trait TrackerReader: Send + Sync {
    /// Metadata objects named [`DEFAULT_NAME`].
    async fn defaults(&self) -> StorageResult<Vec<MetadataObject>>;

    /// Finds a user by UID or username.
    async fn find_user(&self, id: &str) -> StorageResult<Option<User>>;

    /// Finds metadata of `kind` whose identifier under `scheme` is in `values`.
    async fn find_metadata(
        &self,
        kind: MetadataKind,
        scheme: &TrackerIdScheme,
        values: &[String],
    ) -> StorageResult<Vec<MetadataObject>>;

    /// Loads every metadata object of `kind`.
    async fn all_metadata(&self, kind: MetadataKind) -> StorageResult<Vec<MetadataObject>>;

    async fn find_tracked_entities(
        &self,
        uids: &[String],
    ) -> StorageResult<Vec<TrackedEntityInstance>>;

    async fn find_enrollments(&self, uids: &[String]) -> StorageResult<Vec<ProgramInstance>>;

    async fn find_events(&self, uids: &[String]) -> StorageResult<Vec<ProgramStageInstance>>;

    async fn find_relationships(
        &self,
        uids: &[String],
    ) -> StorageResult<Vec<RelationshipInstance>>;

    /// The single enrollment of each program without registration.
    async fn find_program_instances_without_registration(
        &self,
        programs: &[String],
    ) -> StorageResult<Vec<ProgramInstance>>;

    /// Stored values of the given attributes matching any of `values`.
    async fn find_attribute_values(
        &self,
        attributes: &[String],
        values: &[String],
    ) -> StorageResult<Vec<UniqueAttributeValue>>;
}

/// A write transaction scoped to one bundle.
///
/// Operations are staged and applied on [`flush`](TrackerTransaction::flush).
/// Each staged operation is applied atomically on its own: a failing
/// operation leaves no partial state behind and does not abort the others.
/// Nothing is visible outside the transaction before
/// [`commit`](TrackerTransaction::commit).
#[async_trait]
pub trait TrackerTransaction: Send {
    /// Stages a write.
    fn stage(&mut self, operation: WriteOperation);

    /// Number of staged, not yet flushed operations.
    fn pending(&self) -> usize;

    /// Applies staged operations in order.
    async fn flush(&mut self) -> StorageResult<Vec<WriteOutcome>>;

    /// Commits all flushed operations.
    async fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discards everything written in this transaction.
    async fn rollback(self: Box<Self>) -> StorageResult<()>;

    /// Returns whether this transaction is still active.
    fn is_active(&self) -> bool;
}

/// A tracker store.
#[async_trait]
pub trait TrackerStore: Send + Sync {
    /// Short backend name used in logs.
    fn backend_name(&self) -> &'static str;

    /// Opens a consistent read snapshot.
    async fn begin_read(&self) -> StorageResult<Box<dyn TrackerReader>>;

    /// Opens a write transaction.
    async fn begin_write(&self) -> StorageResult<Box<dyn TrackerTransaction>>;

    /// Creates or replaces a metadata object.
    async fn save_metadata(&self, object: MetadataObject) -> StorageResult<()>;

    /// Creates or replaces a user.
    async fn save_user(&self, user: User) -> StorageResult<()>;
}

/// Applies `values` filtering for schemes a backend cannot index.
pub(crate) fn matches_scheme(
    object: &MetadataObject,
    scheme: &TrackerIdScheme,
    values: &[String],
) -> bool {
    use crate::identifier::Identifiable;

    object
        .identify(scheme)
        .is_some_and(|identifier| values.contains(&identifier))
}
