//! Validation behaviour observed through the import service.

mod common;

use common::*;
use dhis_tracker::bundle::TrackerBundle;
use dhis_tracker::domain::Attribute;
use dhis_tracker::validation::{Severity, ValidationErrorReporter, ValidationHook};
use dhis_tracker::{
    TrackerErrorCode, TrackerImportOptions, TrackerImportService, TrackerPayload, TrackerStatus,
    TrackerType, TrackerValidationService, ValidationMode,
};

fn with_national_id(uid: &str, national_id: &str) -> dhis_tracker::TrackedEntity {
    let mut te = tracked_entity(uid);
    te.attributes.push(Attribute::new(NATIONAL_ID, national_id));
    te
}

#[test]
fn test_default_hooks_run_in_order() {
    let service = TrackerValidationService::default();
    assert_eq!(
        service.hook_names(),
        vec![
            "PreheatValidationHook",
            "UidValidationHook",
            "ExistenceValidationHook",
            "MandatoryValidationHook",
            "MetaReferenceValidationHook",
            "OrgUnitSecurityValidationHook",
            "TrackedEntityAttributeValidationHook",
            "EnrollmentAttributeValidationHook",
            "EventDataValuesValidationHook",
            "EventDateValidationHook",
            "RelationshipsValidationHook",
            "RuleEngineValidationHook",
        ]
    );
}

#[tokio::test]
async fn test_invalid_uid_is_reported() {
    let store = memory_store().await;
    let service = TrackerImportService::new(store.clone());
    let payload = TrackerPayload {
        tracked_entities: vec![tracked_entity("not-a-uid")],
        ..Default::default()
    };

    let report = service
        .import(params(&nurse(), payload, TrackerImportOptions::default()))
        .await
        .unwrap();
    let error = report
        .validation_report
        .errors
        .iter()
        .find(|e| e.error_code == TrackerErrorCode::E1048)
        .unwrap();
    assert_eq!(error.uid, "not-a-uid");
    assert_eq!(error.validator, "UidValidationHook");
    assert!(error.message.contains("not-a-uid"));
    assert_eq!(store.count(TrackerType::TrackedEntity), 0);
}

#[tokio::test]
async fn test_unique_attribute_clashes_with_stored_value() {
    let store = memory_store().await;
    let service = TrackerImportService::new(store.clone());
    let payload = TrackerPayload {
        tracked_entities: vec![with_national_id(TEI, "1234")],
        ..Default::default()
    };
    let report = service
        .import(params(&nurse(), payload, TrackerImportOptions::default()))
        .await
        .unwrap();
    assert_eq!(report.stats.created, 1);

    let payload = TrackerPayload {
        tracked_entities: vec![with_national_id("PQfMcpmXeFE", "1234")],
        ..Default::default()
    };
    let report = service
        .import(params(&nurse(), payload, TrackerImportOptions::default()))
        .await
        .unwrap();
    assert_eq!(report.status, TrackerStatus::Error);
    let errors: Vec<_> = report
        .validation_report
        .errors_for(TrackerType::TrackedEntity, "PQfMcpmXeFE")
        .map(|e| e.error_code)
        .collect();
    assert_eq!(errors, vec![TrackerErrorCode::E1064]);

    // The holder of the value may keep it.
    let payload = TrackerPayload {
        tracked_entities: vec![with_national_id(TEI, "1234")],
        ..Default::default()
    };
    let report = service
        .import(params(&nurse(), payload, TrackerImportOptions::default()))
        .await
        .unwrap();
    assert!(report.is_ok(), "{:?}", report.validation_report);
    assert_eq!(report.stats.updated, 1);
}

#[tokio::test]
async fn test_unique_attribute_clashes_inside_bundle() {
    let store = memory_store().await;
    let payload = TrackerPayload {
        tracked_entities: vec![with_national_id(TEI, "77"), with_national_id("PQfMcpmXeFE", "77")],
        ..Default::default()
    };

    let report = TrackerImportService::new(store)
        .import(params(&nurse(), payload, TrackerImportOptions::default()))
        .await
        .unwrap();
    let mut uids: Vec<_> = report
        .validation_report
        .errors
        .iter()
        .filter(|e| e.error_code == TrackerErrorCode::E1064)
        .map(|e| e.uid.as_str())
        .collect();
    uids.sort();
    assert_eq!(uids, vec![TEI, "PQfMcpmXeFE"]);
}

#[tokio::test]
async fn test_attribute_value_type() {
    let store = memory_store().await;
    let payload = TrackerPayload {
        tracked_entities: vec![with_national_id(TEI, "twelve")],
        ..Default::default()
    };

    let report = TrackerImportService::new(store)
        .import(params(&nurse(), payload, TrackerImportOptions::default()))
        .await
        .unwrap();
    let error = &report.validation_report.errors[0];
    assert_eq!(error.error_code, TrackerErrorCode::E1007);
    assert_eq!(error.args[0], NATIONAL_ID);
}

struct RejectEverything;

impl ValidationHook for RejectEverything {
    fn name(&self) -> &'static str {
        "RejectEverything"
    }

    fn order(&self) -> i32 {
        1000
    }

    fn validate(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        for uid in bundle.uids(TrackerType::TrackedEntity) {
            reporter.add_warning(TrackerType::TrackedEntity, &uid, TrackerErrorCode::E1301, ["rUle0000001", "Looked at"]);
            reporter.add_error(TrackerType::TrackedEntity, &uid, TrackerErrorCode::E1300, ["rUle0000001", "Rejected"]);
        }
    }
}

#[tokio::test]
async fn test_custom_hook_runs_last() {
    let store = memory_store().await;
    let validation = TrackerValidationService::default().with_hook(Box::new(RejectEverything));
    assert_eq!(validation.hook_names().last(), Some(&"RejectEverything"));
    let service = TrackerImportService::new(store.clone()).with_validation_service(validation);

    let options = TrackerImportOptions {
        report_mode: dhis_tracker::TrackerReportMode::Warnings,
        ..Default::default()
    };
    let report = service.import(params(&nurse(), three_events(), options)).await.unwrap();

    assert_eq!(report.validation_report.errors.len(), 1);
    assert_eq!(report.validation_report.errors[0].validator, "RejectEverything");
    assert_eq!(report.validation_report.warnings.len(), 1);
    assert_eq!(report.validation_report.warnings[0].severity, Severity::Warning);
    assert_eq!(report.stats.ignored, 5);
    assert_eq!(store.count(TrackerType::Event), 0);
}

#[tokio::test]
async fn test_skip_mode_runs_no_hook() {
    let store = memory_store().await;
    let validation = TrackerValidationService::default().with_hook(Box::new(RejectEverything));
    let service = TrackerImportService::new(store.clone()).with_validation_service(validation);
    let options = TrackerImportOptions {
        validation_mode: ValidationMode::Skip,
        ..Default::default()
    };

    let report = service.import(params(&nurse(), three_events(), options)).await.unwrap();
    assert!(report.validation_report.errors.is_empty());
    assert_eq!(report.stats.created, 5);
}
