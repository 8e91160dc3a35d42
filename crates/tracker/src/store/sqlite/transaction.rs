//! Write transactions for the SQLite store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, ErrorCode, params, params_from_iter};
use tracing::debug;

use super::{BACKEND_NAME, table};
use crate::domain::TrackerType;
use crate::error::{BackendError, CommitError, StorageError, StorageResult};
use crate::model::ProgramType;
use crate::store::{Persistable, TrackerTransaction, WriteOperation, WriteOutcome};

fn text(value: Option<&str>) -> SqlValue {
    value.map_or(SqlValue::Null, |v| SqlValue::Text(v.to_string()))
}

/// Lookup columns stored next to the JSON document.
fn lookup_columns(object: &Persistable) -> Vec<(&'static str, SqlValue)> {
    match object {
        Persistable::TrackedEntity(tei) => vec![(
            "org_unit",
            text(tei.organisation_unit.as_ref().map(|ou| ou.identity.uid.as_str())),
        )],
        Persistable::Enrollment(pi) => vec![
            ("program", text(pi.program.as_ref().map(|p| p.identity.uid.as_str()))),
            (
                "program_type",
                text(pi.program.as_ref().map(|p| match p.program_type {
                    ProgramType::WithRegistration => "WITH_REGISTRATION",
                    ProgramType::WithoutRegistration => "WITHOUT_REGISTRATION",
                })),
            ),
            ("tracked_entity", text(pi.entity_instance.as_deref())),
        ],
        Persistable::Event(psi) => vec![
            (
                "program_stage",
                text(psi.program_stage.as_ref().map(|ps| ps.identity.uid.as_str())),
            ),
            ("enrollment", text(psi.program_instance.as_deref())),
        ],
        Persistable::Relationship(ri) => vec![(
            "relationship_type",
            text(ri.relationship_type.as_ref().map(|rt| rt.identity.uid.as_str())),
        )],
    }
}

fn document(object: &Persistable) -> StorageResult<(String, bool)> {
    Ok(match object {
        Persistable::TrackedEntity(o) => (serde_json::to_string(o)?, o.deleted),
        Persistable::Enrollment(o) => (serde_json::to_string(o)?, o.deleted),
        Persistable::Event(o) => (serde_json::to_string(o)?, o.deleted),
        Persistable::Relationship(o) => (serde_json::to_string(o)?, o.deleted),
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn insert(conn: &Connection, object: &Persistable) -> StorageResult<()> {
    let (data, deleted) = document(object)?;
    let columns = lookup_columns(object);
    let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
    let sql = format!(
        "INSERT INTO {} (uid, deleted, data, last_updated, {}) VALUES ({})",
        table(object.tracker_type()),
        names.join(", "),
        (1..=4 + columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let mut values = vec![
        SqlValue::Text(object.uid().to_string()),
        SqlValue::Integer(deleted as i64),
        SqlValue::Text(data),
        SqlValue::Text(Utc::now().to_rfc3339()),
    ];
    values.extend(columns.into_iter().map(|(_, value)| value));

    conn.execute(&sql, params_from_iter(values.iter()))
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StorageError::AlreadyExists {
                    tracker_type: object.tracker_type(),
                    uid: object.uid().to_string(),
                }
            } else {
                e.into()
            }
        })?;
    Ok(())
}

fn update(conn: &Connection, object: &Persistable) -> StorageResult<()> {
    let (data, deleted) = document(object)?;
    let columns = lookup_columns(object);
    let assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, (name, _))| format!("{} = ?{}", name, i + 5))
        .collect();
    let sql = format!(
        "UPDATE {} SET deleted = ?2, data = ?3, last_updated = ?4, {} WHERE uid = ?1",
        table(object.tracker_type()),
        assignments.join(", ")
    );
    let mut values = vec![
        SqlValue::Text(object.uid().to_string()),
        SqlValue::Integer(deleted as i64),
        SqlValue::Text(data),
        SqlValue::Text(Utc::now().to_rfc3339()),
    ];
    values.extend(columns.into_iter().map(|(_, value)| value));

    let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
    if changed == 0 {
        return Err(StorageError::NotFound {
            tracker_type: object.tracker_type(),
            uid: object.uid().to_string(),
        });
    }
    Ok(())
}

fn soft_delete(conn: &Connection, tracker_type: TrackerType, uid: &str) -> StorageResult<()> {
    let sql = format!(
        "UPDATE {} SET deleted = 1, data = json_set(data, '$.deleted', json('true')),
         last_updated = ?2 WHERE uid = ?1",
        table(tracker_type)
    );
    let changed = conn.execute(&sql, params![uid, Utc::now().to_rfc3339()])?;
    if changed == 0 {
        return Err(StorageError::NotFound {
            tracker_type,
            uid: uid.to_string(),
        });
    }
    Ok(())
}

/// Keeps the attribute value index in line with a written tracked entity.
fn index_attribute_values(conn: &Connection, object: &Persistable) -> StorageResult<()> {
    let Persistable::TrackedEntity(tei) = object else {
        return Ok(());
    };
    conn.execute(
        "DELETE FROM tracked_entity_attribute_values WHERE tracked_entity = ?1",
        params![tei.uid],
    )?;
    let org_unit = tei.organisation_unit.as_ref().map(|ou| ou.identity.uid.as_str());
    for av in &tei.attribute_values {
        if let Some(value) = &av.value {
            conn.execute(
                "INSERT INTO tracked_entity_attribute_values (tracked_entity, attribute, value, org_unit)
                 VALUES (?1, ?2, ?3, ?4)",
                params![tei.uid, av.attribute, value, org_unit],
            )?;
        }
    }
    Ok(())
}

fn apply(conn: &Connection, operation: &WriteOperation) -> StorageResult<()> {
    match operation {
        WriteOperation::Create(object) => {
            insert(conn, object)?;
            index_attribute_values(conn, object)
        }
        WriteOperation::Update(object) => {
            update(conn, object)?;
            index_attribute_values(conn, object)
        }
        WriteOperation::Delete { tracker_type, uid } => soft_delete(conn, *tracker_type, uid),
    }
}

/// A SQLite write transaction.
pub(crate) struct SqliteTransaction {
    conn: Arc<Mutex<PooledConnection<SqliteConnectionManager>>>,
    staged: Vec<WriteOperation>,
    active: bool,
}

impl SqliteTransaction {
    pub(crate) fn new(conn: PooledConnection<SqliteConnectionManager>) -> StorageResult<Self> {
        conn.execute_batch("BEGIN IMMEDIATE").map_err(|e| {
            StorageError::Backend(BackendError::Internal {
                backend_name: BACKEND_NAME.to_string(),
                message: format!("failed to begin transaction: {}", e),
                source: Some(Box::new(e)),
            })
        })?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            staged: Vec::new(),
            active: true,
        })
    }

    fn ensure_active(&self) -> StorageResult<()> {
        if !self.active {
            return Err(StorageError::Backend(BackendError::Internal {
                backend_name: BACKEND_NAME.to_string(),
                message: CommitError::InvalidTransaction.to_string(),
                source: None,
            }));
        }
        Ok(())
    }
}

#[async_trait]
impl TrackerTransaction for SqliteTransaction {
    fn stage(&mut self, operation: WriteOperation) {
        self.staged.push(operation);
    }

    fn pending(&self) -> usize {
        self.staged.len()
    }

    async fn flush(&mut self) -> StorageResult<Vec<WriteOutcome>> {
        self.ensure_active()?;
        let staged = std::mem::take(&mut self.staged);
        let conn = self.conn.lock();
        let mut outcomes = Vec::with_capacity(staged.len());

        for operation in &staged {
            conn.execute_batch("SAVEPOINT tracker_write")?;
            match apply(&conn, operation) {
                Ok(()) => {
                    conn.execute_batch("RELEASE tracker_write")?;
                    outcomes.push(WriteOutcome::applied(operation));
                }
                Err(err) => {
                    conn.execute_batch("ROLLBACK TO tracker_write; RELEASE tracker_write")?;
                    debug!(uid = operation.uid(), error = %err, "Staged write failed");
                    outcomes.push(WriteOutcome::failed(operation, err));
                }
            }
        }

        Ok(outcomes)
    }

    async fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.ensure_active()?;
        self.conn.lock().execute_batch("COMMIT")?;
        self.active = false;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> StorageResult<()> {
        self.ensure_active()?;
        self.conn.lock().execute_batch("ROLLBACK")?;
        self.active = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.active {
            let _ = self.conn.lock().execute_batch("ROLLBACK");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackedEntityInstance;
    use crate::store::{SqliteTrackerStore, TrackerStore};

    fn tei(uid: &str) -> Persistable {
        Persistable::TrackedEntity(TrackedEntityInstance {
            uid: uid.to_string(),
            tracked_entity_type: None,
            organisation_unit: None,
            created: Utc::now(),
            last_updated: Utc::now(),
            created_at_client: None,
            last_updated_at_client: None,
            inactive: false,
            deleted: false,
            geometry: None,
            stored_by: None,
            attribute_values: Vec::new(),
        })
    }

    fn create_test_store() -> SqliteTrackerStore {
        let store = SqliteTrackerStore::in_memory().unwrap();
        store.init_schema().unwrap();
        store
    }

    #[tokio::test]
    async fn test_savepoint_isolates_failed_write() {
        let store = create_test_store();
        let mut tx = store.begin_write().await.unwrap();
        tx.stage(WriteOperation::Create(tei("IOR1AXXl24H")));
        tx.stage(WriteOperation::Create(tei("IOR1AXXl24H")));
        tx.stage(WriteOperation::Create(tei("PQfMcpmXeFE")));
        let outcomes = tx.flush().await.unwrap();
        assert!(outcomes[0].is_applied());
        assert!(outcomes[1].error.as_deref().unwrap().contains("already exists"));
        assert!(outcomes[2].is_applied());
        tx.commit().await.unwrap();
        assert_eq!(store.count(TrackerType::TrackedEntity).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rollback_on_drop() {
        let store = create_test_store();
        {
            let mut tx = store.begin_write().await.unwrap();
            tx.stage(WriteOperation::Create(tei("IOR1AXXl24H")));
            tx.flush().await.unwrap();
        }
        assert_eq!(store.count(TrackerType::TrackedEntity).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_soft_delete_and_missing_update() {
        let store = create_test_store();
        let mut tx = store.begin_write().await.unwrap();
        tx.stage(WriteOperation::Create(tei("IOR1AXXl24H")));
        tx.stage(WriteOperation::Delete {
            tracker_type: TrackerType::TrackedEntity,
            uid: "IOR1AXXl24H".to_string(),
        });
        tx.stage(WriteOperation::Update(tei("PQfMcpmXeFE")));
        let outcomes = tx.flush().await.unwrap();
        assert!(outcomes[1].is_applied());
        assert!(!outcomes[2].is_applied());
        tx.commit().await.unwrap();

        assert_eq!(store.count(TrackerType::TrackedEntity).unwrap(), 1);
        assert_eq!(store.count_live(TrackerType::TrackedEntity).unwrap(), 0);
        let reader = store.begin_read().await.unwrap();
        let found = reader
            .find_tracked_entities(&["IOR1AXXl24H".to_string()])
            .await
            .unwrap();
        assert!(found[0].deleted);
    }
}
