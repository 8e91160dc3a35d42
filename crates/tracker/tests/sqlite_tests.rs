//! End-to-end imports against the SQLite store.

#![cfg(feature = "sqlite")]

mod common;

use std::sync::Arc;

use common::*;
use dhis_tracker::{
    SqliteTrackerStore, TrackedEntity, TrackerImportOptions, TrackerImportService,
    TrackerImportStrategy, TrackerPayload, TrackerStatus, TrackerType, ValidationMode,
};
use tempfile::TempDir;

async fn file_store(dir: &TempDir) -> Arc<SqliteTrackerStore> {
    let store = SqliteTrackerStore::open(dir.path().join("tracker.db")).unwrap();
    store.init_schema().unwrap();
    seed(&store).await;
    Arc::new(store)
}

#[tokio::test]
async fn test_import_persists_to_file() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir).await;
    let service = TrackerImportService::new(store.clone());

    let report = service
        .import(params(&nurse(), three_events(), TrackerImportOptions::default()))
        .await
        .unwrap();
    assert_eq!(report.status, TrackerStatus::Ok, "{:?}", report.validation_report);
    assert_eq!(report.stats.created, 5);
    assert_eq!(store.count(TrackerType::TrackedEntity).unwrap(), 1);
    assert_eq!(store.count(TrackerType::Enrollment).unwrap(), 1);
    assert_eq!(store.count(TrackerType::Event).unwrap(), 3);
}

#[tokio::test]
async fn test_reopened_store_sees_previous_import() {
    let dir = TempDir::new().unwrap();
    {
        let store = file_store(&dir).await;
        let report = TrackerImportService::new(store)
            .import(params(&nurse(), three_events(), TrackerImportOptions::default()))
            .await
            .unwrap();
        assert_eq!(report.stats.created, 5);
    }

    let store = SqliteTrackerStore::open(dir.path().join("tracker.db")).unwrap();
    store.init_schema().unwrap();
    let report = TrackerImportService::new(Arc::new(store))
        .import(params(&nurse(), three_events(), TrackerImportOptions::default()))
        .await
        .unwrap();
    assert_eq!(report.stats.updated, 5);
    assert_eq!(report.stats.created, 0);
}

#[tokio::test]
async fn test_duplicate_create_rolls_back_the_bundle() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir).await;
    let service = TrackerImportService::new(store.clone());
    service
        .import(params(&nurse(), three_events(), TrackerImportOptions::default()))
        .await
        .unwrap();

    // Validation is skipped so the duplicate reaches the database.
    let payload = TrackerPayload {
        tracked_entities: vec![tracked_entity("PQfMcpmXeFE"), tracked_entity(TEI)],
        ..Default::default()
    };
    let options = TrackerImportOptions {
        validation_mode: ValidationMode::Skip,
        import_strategy: TrackerImportStrategy::Create,
        ..Default::default()
    };
    let report = service.import(params(&nurse(), payload, options)).await.unwrap();

    assert_eq!(report.status, TrackerStatus::Error);
    let bundle_report = report.bundle_report.as_ref().unwrap();
    assert!(bundle_report.message.as_deref().is_some_and(|m| m.contains(TEI)));
    assert_eq!(report.stats.ignored, 2);
    assert_eq!(store.count(TrackerType::TrackedEntity).unwrap(), 1);
}

#[tokio::test]
async fn test_delete_is_soft() {
    let store = SqliteTrackerStore::in_memory().unwrap();
    store.init_schema().unwrap();
    seed(&store).await;
    let store = Arc::new(store);
    let service = TrackerImportService::new(store.clone());
    service
        .import(params(&nurse(), three_events(), TrackerImportOptions::default()))
        .await
        .unwrap();

    let payload = TrackerPayload {
        tracked_entities: vec![TrackedEntity::new(TEI)],
        ..Default::default()
    };
    let options = TrackerImportOptions {
        import_strategy: TrackerImportStrategy::Delete,
        ..Default::default()
    };
    let report = service.import(params(&nurse(), payload, options)).await.unwrap();

    assert_eq!(report.stats.deleted, 1);
    assert_eq!(store.count(TrackerType::TrackedEntity).unwrap(), 1);
    assert_eq!(store.count_live(TrackerType::TrackedEntity).unwrap(), 0);
}
