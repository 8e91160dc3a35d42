use crate::bundle::TrackerBundle;
use crate::domain::{TrackerDto, TrackerType};
use crate::options::TrackerImportStrategy;
use crate::validation::{TrackerErrorCode, ValidationErrorReporter, ValidationHook};

/// Checks the stored state of each object against the import strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExistenceValidationHook;

struct Codes {
    already_exists: TrackerErrorCode,
    does_not_exist: TrackerErrorCode,
    already_deleted: TrackerErrorCode,
}

fn codes(tracker_type: TrackerType) -> Codes {
    use TrackerErrorCode::*;
    let (already_exists, does_not_exist, already_deleted) = match tracker_type {
        TrackerType::TrackedEntity => (E1002, E1063, E1114),
        TrackerType::Enrollment => (E1080, E1081, E1113),
        TrackerType::Event => (E1030, E1032, E1082),
        TrackerType::Relationship => (E4015, E4016, E4017),
    };
    Codes {
        already_exists,
        does_not_exist,
        already_deleted,
    }
}

fn check<T: TrackerDto>(
    bundle: &TrackerBundle,
    reporter: &mut ValidationErrorReporter,
    objects: &[T],
) {
    let strategy = bundle.strategy();
    let codes = codes(T::TRACKER_TYPE);
    for object in objects {
        let uid = object.uid();
        let code = match bundle.preheat.is_deleted(T::TRACKER_TYPE, uid) {
            Some(true) => Some(codes.already_deleted),
            Some(false) if strategy.is_create() => Some(codes.already_exists),
            Some(false) => None,
            None => {
                let deleting = strategy.is_delete()
                    || (strategy == TrackerImportStrategy::Sync && object.is_deleted());
                (deleting || strategy.is_update()).then_some(codes.does_not_exist)
            }
        };
        if let Some(code) = code {
            reporter.add_error(T::TRACKER_TYPE, uid, code, [uid]);
        }
    }
}

impl ValidationHook for ExistenceValidationHook {
    fn name(&self) -> &'static str {
        "ExistenceValidationHook"
    }

    fn order(&self) -> i32 {
        2
    }

    fn applies_to_delete(&self) -> bool {
        true
    }

    fn validate(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        check(bundle, reporter, bundle.tracked_entities());
        check(bundle, reporter, bundle.enrollments());
        check(bundle, reporter, bundle.events());
        check(bundle, reporter, bundle.relationships());
    }
}
