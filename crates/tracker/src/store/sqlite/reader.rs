use async_trait::async_trait;
use parking_lot::Mutex;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, params_from_iter};
use serde::de::DeserializeOwned;

use super::table;
use crate::domain::TrackerType;
use crate::error::StorageResult;
use crate::identifier::TrackerIdScheme;
use crate::model::{
    MetadataKind, MetadataObject, ProgramInstance, ProgramStageInstance, RelationshipInstance,
    TrackedEntityInstance,
};
use crate::store::{DEFAULT_NAME, TrackerReader, UniqueAttributeValue, matches_scheme};
use crate::user::User;

/// Maximum number of bound values per `IN` list.
const CHUNK_SIZE: usize = 500;

fn placeholders(offset: usize, count: usize) -> String {
    (offset + 1..=offset + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn query_json<T: DeserializeOwned>(
    conn: &Connection,
    sql: &str,
    values: &[String],
) -> StorageResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?;
    let mut objects = Vec::new();
    for row in rows {
        objects.push(serde_json::from_str(&row?)?);
    }
    Ok(objects)
}

/// Runs `sql_for(placeholders)` once per chunk of `keys`, after `leading` values.
fn query_chunked<T: DeserializeOwned>(
    conn: &Connection,
    leading: &[String],
    keys: &[String],
    sql_for: impl Fn(&str) -> String,
) -> StorageResult<Vec<T>> {
    let mut objects = Vec::new();
    for chunk in keys.chunks(CHUNK_SIZE) {
        let sql = sql_for(&placeholders(leading.len(), chunk.len()));
        let values: Vec<String> = leading.iter().chain(chunk).cloned().collect();
        objects.extend(query_json(conn, &sql, &values)?);
    }
    Ok(objects)
}

/// A read snapshot on one pooled connection.
///
/// The deferred transaction takes its snapshot at the first query and is
/// ended when the reader is dropped.
pub(crate) struct SqliteReader {
    conn: Mutex<PooledConnection<SqliteConnectionManager>>,
}

impl SqliteReader {
    pub(crate) fn new(conn: PooledConnection<SqliteConnectionManager>) -> StorageResult<Self> {
        conn.execute_batch("BEGIN DEFERRED")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn find_tracker<T: DeserializeOwned>(
        &self,
        tracker_type: TrackerType,
        uids: &[String],
    ) -> StorageResult<Vec<T>> {
        let conn = self.conn.lock();
        query_chunked(&conn, &[], uids, |ph| {
            format!("SELECT data FROM {} WHERE uid IN ({})", table(tracker_type), ph)
        })
    }
}

impl Drop for SqliteReader {
    fn drop(&mut self) {
        let _ = self.conn.lock().execute_batch("ROLLBACK");
    }
}

#[async_trait]
impl TrackerReader for SqliteReader {
    async fn defaults(&self) -> StorageResult<Vec<MetadataObject>> {
        let conn = self.conn.lock();
        query_json(
            &conn,
            "SELECT data FROM metadata WHERE name = ?1 AND kind != 'User'",
            &[DEFAULT_NAME.to_string()],
        )
    }

    async fn find_user(&self, id: &str) -> StorageResult<Option<User>> {
        let conn = self.conn.lock();
        let found: Vec<MetadataObject> = query_json(
            &conn,
            "SELECT data FROM metadata WHERE kind = 'User' AND (uid = ?1 OR code = ?1) LIMIT 1",
            &[id.to_string()],
        )?;
        Ok(found.into_iter().find_map(|object| match object {
            MetadataObject::User(user) => Some(user.as_ref().clone()),
            _ => None,
        }))
    }

    async fn find_metadata(
        &self,
        kind: MetadataKind,
        scheme: &TrackerIdScheme,
        values: &[String],
    ) -> StorageResult<Vec<MetadataObject>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let column = match scheme {
            TrackerIdScheme::Uid => "uid",
            TrackerIdScheme::Code => "code",
            TrackerIdScheme::Name => "name",
            TrackerIdScheme::Attribute(_) => {
                let all = self.all_metadata(kind).await?;
                return Ok(all
                    .into_iter()
                    .filter(|object| matches_scheme(object, scheme, values))
                    .collect());
            }
        };
        let conn = self.conn.lock();
        query_chunked(&conn, &[kind.as_str().to_string()], values, |ph| {
            format!("SELECT data FROM metadata WHERE kind = ?1 AND {} IN ({})", column, ph)
        })
    }

    async fn all_metadata(&self, kind: MetadataKind) -> StorageResult<Vec<MetadataObject>> {
        let conn = self.conn.lock();
        query_json(
            &conn,
            "SELECT data FROM metadata WHERE kind = ?1",
            &[kind.as_str().to_string()],
        )
    }

    async fn find_tracked_entities(
        &self,
        uids: &[String],
    ) -> StorageResult<Vec<TrackedEntityInstance>> {
        self.find_tracker(TrackerType::TrackedEntity, uids)
    }

    async fn find_enrollments(&self, uids: &[String]) -> StorageResult<Vec<ProgramInstance>> {
        self.find_tracker(TrackerType::Enrollment, uids)
    }

    async fn find_events(&self, uids: &[String]) -> StorageResult<Vec<ProgramStageInstance>> {
        self.find_tracker(TrackerType::Event, uids)
    }

    async fn find_relationships(
        &self,
        uids: &[String],
    ) -> StorageResult<Vec<RelationshipInstance>> {
        self.find_tracker(TrackerType::Relationship, uids)
    }

    async fn find_program_instances_without_registration(
        &self,
        programs: &[String],
    ) -> StorageResult<Vec<ProgramInstance>> {
        let conn = self.conn.lock();
        query_chunked(&conn, &[], programs, |ph| {
            format!(
                "SELECT data FROM enrollments
                 WHERE program IN ({}) AND program_type = 'WITHOUT_REGISTRATION' AND deleted = 0",
                ph
            )
        })
    }

    async fn find_attribute_values(
        &self,
        attributes: &[String],
        values: &[String],
    ) -> StorageResult<Vec<UniqueAttributeValue>> {
        if attributes.is_empty() || values.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock();
        let mut found = Vec::new();
        for chunk in values.chunks(CHUNK_SIZE) {
            let sql = format!(
                "SELECT v.attribute, v.value, v.tracked_entity, v.org_unit
                 FROM tracked_entity_attribute_values v
                 JOIN tracked_entities t ON t.uid = v.tracked_entity AND t.deleted = 0
                 WHERE v.attribute IN ({}) AND v.value IN ({})",
                placeholders(0, attributes.len()),
                placeholders(attributes.len(), chunk.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(attributes.iter().chain(chunk)), |row| {
                Ok(UniqueAttributeValue {
                    attribute: row.get(0)?,
                    value: row.get(1)?,
                    tracked_entity: row.get(2)?,
                    org_unit: row.get(3)?,
                })
            })?;
            for row in rows {
                found.push(row?);
            }
        }
        Ok(found)
    }
}
