//! Ordered validation hooks over a converted bundle.
//!
//! Hooks are plain trait objects registered in a list and run in ascending
//! [`order`](ValidationHook::order). They read the bundle and record findings
//! on a shared [`ValidationErrorReporter`]; they never modify the bundle.
//!
//! | Order | Hook | Codes |
//! |-------|------|-------|
//! | 0 | [`PreheatValidationHook`] | E9000 |
//! | 1 | [`UidValidationHook`] | E1048 |
//! | 2 | [`ExistenceValidationHook`] | E1002, E1030, E1032, E1063, E1080, E1081, E1082, E1113, E1114, E4015-E4017 |
//! | 3 | [`MandatoryValidationHook`] | E1121-E1124 |
//! | 4 | [`MetaReferenceValidationHook`] | E1005, E1010, E1011, E1013, E1033, E1049, E1068-E1070, E1115, E1118, E4006 |
//! | 5 | [`OrgUnitSecurityValidationHook`] | E1000 |
//! | 100 | [`TrackedEntityAttributeValidationHook`] | E1006-E1008, E1064, E1090 |
//! | 105 | [`EnrollmentAttributeValidationHook`] | E1007, E1017-E1019, E1064, E1075, E1076 |
//! | 110 | [`EventDataValuesValidationHook`] | E1302-E1304 |
//! | 111 | [`EventDateValidationHook`] | E1031, E1050, E1051 |
//! | 120 | [`RelationshipsValidationHook`] | E4000, E4001, E4012 |
//! | 200 | [`RuleEngineValidationHook`] | E1300, E1301 |

pub(crate) mod hooks;
mod report;
mod reporter;
mod service;

use crate::bundle::TrackerBundle;

pub use hooks::{
    EnrollmentAttributeValidationHook, EventDataValuesValidationHook, EventDateValidationHook,
    ExistenceValidationHook, MandatoryValidationHook, MetaReferenceValidationHook,
    OrgUnitSecurityValidationHook, PreheatValidationHook, RelationshipsValidationHook,
    RuleEngineValidationHook, TrackedEntityAttributeValidationHook, UidValidationHook,
    default_hooks,
};
pub use report::{
    Severity, TrackerErrorCode, TrackerErrorReport, TrackerValidationReport, render,
};
pub use reporter::ValidationErrorReporter;
pub use service::TrackerValidationService;

/// One validation step.
pub trait ValidationHook: Send + Sync {
    /// Name stamped on the findings of this hook.
    fn name(&self) -> &'static str;

    /// Position in the chain. Lower runs first.
    fn order(&self) -> i32;

    /// Whether the hook also runs for delete imports. Most hooks check
    /// content and have nothing to say about deletions.
    fn applies_to_delete(&self) -> bool {
        false
    }

    /// Records findings for the bundle.
    fn validate(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter);
}
