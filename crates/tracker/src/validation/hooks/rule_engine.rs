use std::collections::HashMap;

use crate::bundle::TrackerBundle;
use crate::domain::TrackerType;
use crate::model::{RuleAction, RuleEffect};
use crate::validation::{TrackerErrorCode, ValidationErrorReporter, ValidationHook};

/// Turns blocking and warning rule effects into findings.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleEngineValidationHook;

impl RuleEngineValidationHook {
    fn report(
        reporter: &mut ValidationErrorReporter,
        tracker_type: TrackerType,
        effects: &HashMap<String, Vec<RuleEffect>>,
    ) {
        let mut uids: Vec<_> = effects.keys().collect();
        uids.sort();
        for uid in uids {
            for effect in &effects[uid] {
                match &effect.action {
                    RuleAction::ShowError { content } => reporter.add_error(
                        tracker_type,
                        uid,
                        TrackerErrorCode::E1300,
                        [effect.rule.as_str(), content.as_str()],
                    ),
                    RuleAction::ShowWarning { content } => reporter.add_warning(
                        tracker_type,
                        uid,
                        TrackerErrorCode::E1301,
                        [effect.rule.as_str(), content.as_str()],
                    ),
                    _ => {}
                }
            }
        }
    }
}

impl ValidationHook for RuleEngineValidationHook {
    fn name(&self) -> &'static str {
        "RuleEngineValidationHook"
    }

    fn order(&self) -> i32 {
        200
    }

    fn validate(&self, bundle: &TrackerBundle, reporter: &mut ValidationErrorReporter) {
        let objects = &bundle.objects;
        Self::report(reporter, TrackerType::Enrollment, &objects.enrollment_rule_effects);
        Self::report(reporter, TrackerType::Event, &objects.event_rule_effects);
    }
}
