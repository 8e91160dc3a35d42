use crate::bundle::TrackerBundle;
use crate::domain::{TrackerDto, TrackerType};
use crate::model::OrganisationUnit;
use crate::validation::{TrackerErrorCode, ValidationErrorReporter, ValidationHook};

/// Checks that objects are captured inside the user's organisation units.
///
/// Superusers bypass the check. Unresolved units are left to the reference
/// checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrgUnitSecurityValidationHook;

impl OrgUnitSecurityValidationHook {
    fn check(
        &self,
        bundle: &TrackerBundle,
        reporter: &mut ValidationErrorReporter,
        tracker_type: TrackerType,
        uid: &str,
        org_unit: Option<&str>,
    ) {
        let Some(unit) = bundle.preheat.resolve::<OrganisationUnit>(org_unit) else {
            return;
        };
        let user = bundle.user();
        let in_scope = user
            .organisation_units
            .iter()
            .any(|scope| unit.is_descendant_of(scope));
        if !in_scope {
            reporter.add_error(
                tracker_type,
                uid,
                TrackerErrorCode::E1000,
                [user.username.as_str(), unit.identity.uid.as_str()],
            );
        }
    }
}

impl ValidationHook for OrgUnitSecurityValidationHook {
    fn name(&self) -> &'static str {
        "OrgUnitSecurityValidationHook"
    }

    fn order(&self) -> i32 {
        5
    }

    fn validate(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        if bundle.user().is_super() {
            return;
        }
        for te in bundle.tracked_entities() {
            self.check(bundle, reporter, TrackerType::TrackedEntity, te.uid(), te.org_unit.as_deref());
        }
        for enrollment in bundle.enrollments() {
            self.check(
                bundle,
                reporter,
                TrackerType::Enrollment,
                enrollment.uid(),
                enrollment.org_unit.as_deref(),
            );
        }
        for event in bundle.events() {
            self.check(bundle, reporter, TrackerType::Event, event.uid(), event.org_unit.as_deref());
        }
    }
}
