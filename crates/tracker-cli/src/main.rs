//! Tracker importer
//!
//! Imports a tracker payload file into a SQLite tracker store and prints the
//! import report as JSON.

mod config;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dhis_tracker::model::MetadataObject;
use dhis_tracker::store::TrackerStore;
use dhis_tracker::{
    SqliteTrackerStore, TrackerImportParams, TrackerImportService, TrackerPayload, TrackerStatus,
    User,
};
use serde::Deserialize;
use tracing::info;

use crate::config::{ImportConfig, init_logging};

/// Metadata and users saved before the import runs.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SeedDocument {
    metadata: Vec<MetadataObject>,
    users: Vec<User>,
}

/// Opens the SQLite store and brings its schema up to date.
fn create_sqlite_store(config: &ImportConfig) -> anyhow::Result<SqliteTrackerStore> {
    info!(database = %config.database, "Initializing SQLite store");

    let store = if config.database == ":memory:" {
        SqliteTrackerStore::in_memory()?
    } else {
        SqliteTrackerStore::open(&config.database)?
    };
    store.init_schema()?;

    Ok(store)
}

async fn seed(store: &dyn TrackerStore, path: &Path) -> anyhow::Result<()> {
    let document = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    let seed: SeedDocument = serde_json::from_str(&document)
        .with_context(|| format!("Failed to parse seed file {}", path.display()))?;

    let (metadata, users) = (seed.metadata.len(), seed.users.len());
    for object in seed.metadata {
        store.save_metadata(object).await?;
    }
    for user in seed.users {
        store.save_user(user).await?;
    }
    info!(metadata, users, "Seed data saved");
    Ok(())
}

fn read_payload(path: &Path) -> anyhow::Result<TrackerPayload> {
    let document = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload {}", path.display()))?;
    Ok(TrackerPayload::from_json(&document)?)
}

async fn run(config: ImportConfig) -> anyhow::Result<TrackerStatus> {
    let options = config
        .import_options()
        .map_err(|errors| anyhow::anyhow!("Invalid import options: {}", errors.join("; ")))?;

    let store = Arc::new(create_sqlite_store(&config)?);
    if let Some(path) = &config.seed {
        seed(store.as_ref(), path).await?;
    }
    let payload = read_payload(&config.payload)?;

    let service = TrackerImportService::new(store);
    let params = TrackerImportParams::new(config.user.clone(), payload).with_options(options);
    let report = service.import(params).await?;

    let output = if config.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", output);
    Ok(report.status)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let config = ImportConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        return Ok(ExitCode::from(1));
    }

    info!(
        database = %config.database,
        user = %config.user,
        payload = %config.payload.display(),
        version = dhis_tracker::VERSION,
        "Starting tracker import"
    );

    match run(config).await? {
        TrackerStatus::Error => Ok(ExitCode::from(2)),
        TrackerStatus::Ok | TrackerStatus::Warning => Ok(ExitCode::SUCCESS),
    }
}

#[cfg(not(feature = "sqlite"))]
compile_error!("The importer requires the 'sqlite' feature");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_document_defaults() {
        let seed: SeedDocument = serde_json::from_str(r#"{"users": []}"#).unwrap();
        assert!(seed.metadata.is_empty());
        assert!(seed.users.is_empty());
    }

    #[tokio::test]
    async fn test_run_imports_into_file_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let seed_path = dir.path().join("seed.json");
        let payload_path = dir.path().join("payload.json");
        std::fs::write(
            &seed_path,
            r#"{"users": [{"uid": "xE7jOejl9FI", "username": "admin", "authorities": ["ALL"]}]}"#,
        )
        .unwrap();
        std::fs::write(&payload_path, r#"{"trackedEntities": []}"#).unwrap();

        let config = ImportConfig {
            payload: payload_path,
            database: dir.path().join("tracker.db").to_string_lossy().into_owned(),
            seed: Some(seed_path),
            user: "admin".to_string(),
            ..Default::default()
        };
        let status = run(config).await.unwrap();
        assert_eq!(status, TrackerStatus::Ok);
    }
}
