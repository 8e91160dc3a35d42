use crate::bundle::TrackerBundle;
use crate::domain::{Note, TrackerDto, TrackerType};
use crate::identifier::CodeGenerator;
use crate::validation::{TrackerErrorCode, ValidationErrorReporter, ValidationHook};

/// Rejects client-supplied identifiers that are not valid UIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UidValidationHook;

fn check(reporter: &mut ValidationErrorReporter, tracker_type: TrackerType, uid: &str) {
    if !CodeGenerator::is_valid_uid(uid) {
        reporter.add_error(tracker_type, uid, TrackerErrorCode::E1048, [tracker_type.as_str(), uid]);
    }
}

fn check_notes(
    reporter: &mut ValidationErrorReporter,
    tracker_type: TrackerType,
    owner: &str,
    notes: &[Note],
) {
    for note in notes {
        if let Some(uid) = note.note.as_deref().filter(|uid| !CodeGenerator::is_valid_uid(uid)) {
            reporter.add_error(tracker_type, owner, TrackerErrorCode::E1048, ["note", uid]);
        }
    }
}

impl ValidationHook for UidValidationHook {
    fn name(&self) -> &'static str {
        "UidValidationHook"
    }

    fn order(&self) -> i32 {
        1
    }

    fn validate(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        for te in bundle.tracked_entities() {
            check(reporter, TrackerType::TrackedEntity, te.uid());
        }
        for enrollment in bundle.enrollments() {
            check(reporter, TrackerType::Enrollment, enrollment.uid());
            check_notes(reporter, TrackerType::Enrollment, enrollment.uid(), &enrollment.notes);
        }
        for event in bundle.events() {
            check(reporter, TrackerType::Event, event.uid());
            check_notes(reporter, TrackerType::Event, event.uid(), &event.notes);
        }
        for relationship in bundle.relationships() {
            check(reporter, TrackerType::Relationship, relationship.uid());
        }
    }
}
