//! SQLite schema definitions and migrations.

use rusqlite::Connection;

use crate::error::{BackendError, StorageError, StorageResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

fn migration_error(step: &str, e: rusqlite::Error) -> StorageError {
    StorageError::Backend(BackendError::MigrationError {
        message: format!("{}: {}", step, e),
    })
}

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, 1)?;
        migrate_schema(conn, 1)?;
    } else if current_version < SCHEMA_VERSION {
        migrate_schema(conn, current_version)?;
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> StorageResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| migration_error("failed to create schema_version table", e))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| migration_error("failed to clear schema_version", e))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| migration_error("failed to set schema_version", e))?;
    Ok(())
}

/// Metadata, users and the four tracker object tables.
///
/// Objects are stored as JSON in `data`. The other columns exist for lookups.
fn create_schema_v1(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
            kind TEXT NOT NULL,
            uid TEXT NOT NULL,
            code TEXT,
            name TEXT,
            data TEXT NOT NULL,
            PRIMARY KEY (kind, uid)
        );
        CREATE INDEX IF NOT EXISTS idx_metadata_code ON metadata(kind, code);
        CREATE INDEX IF NOT EXISTS idx_metadata_name ON metadata(kind, name);

        CREATE TABLE IF NOT EXISTS tracked_entities (
            uid TEXT PRIMARY KEY,
            org_unit TEXT,
            deleted INTEGER NOT NULL DEFAULT 0,
            data TEXT NOT NULL,
            last_updated TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS enrollments (
            uid TEXT PRIMARY KEY,
            program TEXT,
            program_type TEXT,
            tracked_entity TEXT,
            deleted INTEGER NOT NULL DEFAULT 0,
            data TEXT NOT NULL,
            last_updated TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_enrollments_program ON enrollments(program, program_type);

        CREATE TABLE IF NOT EXISTS events (
            uid TEXT PRIMARY KEY,
            program_stage TEXT,
            enrollment TEXT,
            deleted INTEGER NOT NULL DEFAULT 0,
            data TEXT NOT NULL,
            last_updated TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_enrollment ON events(enrollment);

        CREATE TABLE IF NOT EXISTS relationships (
            uid TEXT PRIMARY KEY,
            relationship_type TEXT,
            deleted INTEGER NOT NULL DEFAULT 0,
            data TEXT NOT NULL,
            last_updated TEXT NOT NULL
        );
        ",
    )
    .map_err(|e| migration_error("failed to create schema v1", e))
}

fn migrate_schema(conn: &Connection, from_version: i32) -> StorageResult<()> {
    let mut version = from_version;

    if version < 2 {
        migrate_v1_to_v2(conn)?;
        version = 2;
        set_schema_version(conn, version)?;
    }

    tracing::debug!(version, "SQLite tracker schema up to date");
    Ok(())
}

/// Adds the attribute value index used by uniqueness checks.
fn migrate_v1_to_v2(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tracked_entity_attribute_values (
            tracked_entity TEXT NOT NULL,
            attribute TEXT NOT NULL,
            value TEXT NOT NULL,
            org_unit TEXT,
            PRIMARY KEY (tracked_entity, attribute)
        );
        CREATE INDEX IF NOT EXISTS idx_teav_attribute_value
            ON tracked_entity_attribute_values(attribute, value);
        ",
    )
    .map_err(|e| migration_error("failed to migrate schema to v2", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();
        let version: i32 = conn
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_migrates_from_v1() {
        let conn = Connection::open_in_memory().unwrap();
        get_schema_version(&conn).unwrap();
        create_schema_v1(&conn).unwrap();
        set_schema_version(&conn, 1).unwrap();
        initialize_schema(&conn).unwrap();
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'tracked_entity_attribute_values'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
