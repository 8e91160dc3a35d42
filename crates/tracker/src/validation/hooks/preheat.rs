use crate::bundle::TrackerBundle;
use crate::domain::{TrackerDto, TrackerType};
use crate::validation::{TrackerErrorCode, ValidationErrorReporter, ValidationHook};

/// Surfaces suppliers that failed during a best-effort preheat.
///
/// A failed supplier leaves part of the cache empty, so findings of later
/// hooks such as "could not find" may be caused by the failure rather than by
/// the payload. Every object gets an E9000 warning per failed supplier.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreheatValidationHook;

impl ValidationHook for PreheatValidationHook {
    fn name(&self) -> &'static str {
        "PreheatValidationHook"
    }

    fn order(&self) -> i32 {
        0
    }

    fn applies_to_delete(&self) -> bool {
        true
    }

    fn validate(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        let failures = bundle.preheat.failed_suppliers();
        if failures.is_empty() {
            return;
        }

        let objects = bundle
            .tracked_entities()
            .iter()
            .map(|o| (TrackerType::TrackedEntity, o.uid()))
            .chain(bundle.enrollments().iter().map(|o| (TrackerType::Enrollment, o.uid())))
            .chain(bundle.events().iter().map(|o| (TrackerType::Event, o.uid())))
            .chain(bundle.relationships().iter().map(|o| (TrackerType::Relationship, o.uid())));

        for (tracker_type, uid) in objects {
            for failure in failures {
                reporter.add_warning(
                    tracker_type,
                    uid,
                    TrackerErrorCode::E9000,
                    [failure.supplier.as_str(), failure.message.as_str()],
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Event, TrackerPayload};
    use crate::validation::hooks::testing::{preheat, run, user, bundle_with};

    #[test]
    fn test_failed_supplier_warns_every_object() {
        let mut preheat = preheat();
        preheat.record_failure("EventSupplier", "database is locked");
        let payload = TrackerPayload {
            events: vec![Event::new("ZwwuwNp6gVd"), Event::new("PwwuwNp6gVd")],
            ..Default::default()
        };
        let bundle = bundle_with(payload, preheat, user(), Default::default());

        let report = run(&PreheatValidationHook, &bundle);
        assert!(report.errors.is_empty());
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(
            report.warnings[0].message,
            "Preheat supplier `EventSupplier` failed: `database is locked`."
        );
    }
}
