//! SQLite tracker store.
//!
//! Tracker objects and metadata are stored as JSON documents next to a few
//! indexed lookup columns. Deletes are soft: the row stays with `deleted = 1`.
//!
//! # Example
//!
//! ```no_run
//! use dhis_tracker::store::SqliteTrackerStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteTrackerStore::open("tracker.db")?;
//! store.init_schema()?;
//! # Ok(())
//! # }
//! ```

mod reader;
mod schema;
mod transaction;

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use super::{TrackerReader, TrackerStore, TrackerTransaction};
use crate::domain::TrackerType;
use crate::error::{BackendError, StorageError, StorageResult};
use crate::identifier::Identifiable;
use crate::model::MetadataObject;
use crate::user::User;

pub use schema::SCHEMA_VERSION;

use reader::SqliteReader;
use transaction::SqliteTransaction;

pub(crate) const BACKEND_NAME: &str = "sqlite";

pub(crate) fn table(tracker_type: TrackerType) -> &'static str {
    match tracker_type {
        TrackerType::TrackedEntity => "tracked_entities",
        TrackerType::Enrollment => "enrollments",
        TrackerType::Event => "events",
        TrackerType::Relationship => "relationships",
    }
}

/// Configuration for the SQLite store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Enable WAL mode so preheat snapshots do not block commits.
    #[serde(default = "default_true")]
    pub enable_wal: bool,

    #[serde(default = "default_true")]
    pub enable_foreign_keys: bool,
}

fn default_max_connections() -> u32 {
    8
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

/// A tracker store backed by SQLite.
pub struct SqliteTrackerStore {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteStoreConfig,
    is_memory: bool,
}

impl Debug for SqliteTrackerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteTrackerStore")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

impl SqliteTrackerStore {
    /// Creates an in-memory store.
    ///
    /// Every pooled connection to `:memory:` would see its own database, so
    /// the pool is limited to a single connection.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_config(
            ":memory:",
            SqliteStoreConfig {
                max_connections: 1,
                ..Default::default()
            },
        )
    }

    /// Opens or creates a file-based database.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteStoreConfig::default())
    }

    /// Creates a store with custom configuration.
    pub fn with_config<P: AsRef<Path>>(path: P, config: SqliteStoreConfig) -> StorageResult<Self> {
        let is_memory = path.as_ref().to_string_lossy() == ":memory:";

        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let foreign_keys = config.enable_foreign_keys;
        let manager = SqliteConnectionManager::file(path.as_ref()).with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if foreign_keys {
                conn.execute_batch("PRAGMA foreign_keys = ON")?;
            }
            Ok(())
        });

        let pool = Pool::builder()
            .max_size(config.max_connections)
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .build(manager)
            .map_err(|e| {
                StorageError::Backend(BackendError::ConnectionFailed {
                    backend_name: BACKEND_NAME.to_string(),
                    message: e.to_string(),
                })
            })?;

        let store = Self {
            pool,
            config,
            is_memory,
        };

        if store.config.enable_wal && !store.is_memory {
            let conn = store.get_connection()?;
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        }

        Ok(store)
    }

    /// Initialize the database schema.
    pub fn init_schema(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn)
    }

    pub(crate) fn get_connection(&self) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: BACKEND_NAME.to_string(),
                message: e.to_string(),
            })
        })
    }

    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    pub fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Number of rows of a tracker type, soft-deleted ones included.
    pub fn count(&self, tracker_type: TrackerType) -> StorageResult<usize> {
        let conn = self.get_connection()?;
        let sql = format!("SELECT COUNT(*) FROM {}", table(tracker_type));
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Number of live (not soft-deleted) rows of a tracker type.
    pub fn count_live(&self, tracker_type: TrackerType) -> StorageResult<usize> {
        let conn = self.get_connection()?;
        let sql = format!("SELECT COUNT(*) FROM {} WHERE deleted = 0", table(tracker_type));
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[async_trait]
impl TrackerStore for SqliteTrackerStore {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn begin_read(&self) -> StorageResult<Box<dyn TrackerReader>> {
        let conn = self.get_connection()?;
        Ok(Box::new(SqliteReader::new(conn)?))
    }

    async fn begin_write(&self) -> StorageResult<Box<dyn TrackerTransaction>> {
        let conn = self.get_connection()?;
        Ok(Box::new(SqliteTransaction::new(conn)?))
    }

    async fn save_metadata(&self, object: MetadataObject) -> StorageResult<()> {
        let conn = self.get_connection()?;
        let data = serde_json::to_string(&object)?;
        conn.execute(
            "INSERT OR REPLACE INTO metadata (kind, uid, code, name, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                object.kind().as_str(),
                object.uid(),
                object.code(),
                object.name(),
                data
            ],
        )?;
        Ok(())
    }

    async fn save_user(&self, user: User) -> StorageResult<()> {
        self.save_metadata(MetadataObject::User(std::sync::Arc::new(user)))
            .await
    }
}
