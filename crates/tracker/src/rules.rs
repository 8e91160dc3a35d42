//! Program rule evaluation seam.
//!
//! A [`RuleEngine`] looks at each converted enrollment and event and returns
//! the effects its program rules produce. Effects are attached to the bundle
//! before validation: blocking and warning effects are reported by
//! [`RuleEngineValidationHook`](crate::validation::RuleEngineValidationHook),
//! message effects become side effects of the commit.

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;

use crate::bundle::TrackerBundle;
use crate::model::{ProgramInstance, ProgramStageInstance, RuleEffect};

/// Evaluates program rules.
pub trait RuleEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Effects for an enrollment of the bundle.
    fn evaluate_enrollment(
        &self,
        bundle: &TrackerBundle,
        enrollment: &ProgramInstance,
    ) -> Vec<RuleEffect>;

    /// Effects for an event of the bundle.
    fn evaluate_event(&self, bundle: &TrackerBundle, event: &ProgramStageInstance)
    -> Vec<RuleEffect>;
}

/// A rule engine without rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRuleEngine;

impl RuleEngine for NoopRuleEngine {
    fn name(&self) -> &'static str {
        "NoopRuleEngine"
    }

    fn evaluate_enrollment(&self, _: &TrackerBundle, _: &ProgramInstance) -> Vec<RuleEffect> {
        Vec::new()
    }

    fn evaluate_event(&self, _: &TrackerBundle, _: &ProgramStageInstance) -> Vec<RuleEffect> {
        Vec::new()
    }
}

/// Evaluates `engine` over the converted bundle and stores the effects on it.
///
/// Does nothing when the import skips the rule engine. Objects without
/// effects get no entry.
pub fn apply_rule_effects(engine: &dyn RuleEngine, bundle: &mut TrackerBundle) {
    if bundle.config.options.skip_rule_engine {
        debug!(engine = engine.name(), "Rule engine skipped");
        return;
    }

    let started = Instant::now();
    let converted = &bundle.objects.converted;
    let enrollment_effects: HashMap<String, Vec<RuleEffect>> = converted
        .enrollments
        .iter()
        .map(|(uid, pi)| (uid.clone(), engine.evaluate_enrollment(bundle, pi)))
        .filter(|(_, effects)| !effects.is_empty())
        .collect();
    let event_effects: HashMap<String, Vec<RuleEffect>> = converted
        .events
        .iter()
        .map(|(uid, psi)| (uid.clone(), engine.evaluate_event(bundle, psi)))
        .filter(|(_, effects)| !effects.is_empty())
        .collect();

    debug!(
        engine = engine.name(),
        enrollments = enrollment_effects.len(),
        events = event_effects.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Rule effects evaluated"
    );
    bundle.objects.enrollment_rule_effects = enrollment_effects;
    bundle.objects.event_rule_effects = event_effects;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Event, TrackerPayload};
    use crate::model::RuleAction;
    use crate::options::TrackerImportOptions;
    use crate::validation::hooks::testing::{ORG_UNIT, STAGE, bundle_with, preheat, user};

    struct WarnEveryEvent;

    impl RuleEngine for WarnEveryEvent {
        fn name(&self) -> &'static str {
            "WarnEveryEvent"
        }

        fn evaluate_enrollment(&self, _: &TrackerBundle, _: &ProgramInstance) -> Vec<RuleEffect> {
            Vec::new()
        }

        fn evaluate_event(&self, _: &TrackerBundle, event: &ProgramStageInstance) -> Vec<RuleEffect> {
            vec![RuleEffect::new(
                "rUle0000001",
                RuleAction::ShowWarning {
                    content: format!("check {}", event.uid),
                },
            )]
        }
    }

    fn payload() -> TrackerPayload {
        TrackerPayload {
            events: vec![Event {
                program_stage: Some(STAGE.to_string()),
                org_unit: Some(ORG_UNIT.to_string()),
                ..Event::new("ZwwuwNp6gVd")
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_effects_attached_per_object() {
        let mut bundle = bundle_with(payload(), preheat(), user(), TrackerImportOptions::default());
        apply_rule_effects(&WarnEveryEvent, &mut bundle);
        assert_eq!(bundle.objects.event_rule_effects["ZwwuwNp6gVd"].len(), 1);
        assert!(bundle.objects.enrollment_rule_effects.is_empty());
    }

    #[test]
    fn test_skip_rule_engine() {
        let options = TrackerImportOptions {
            skip_rule_engine: true,
            ..Default::default()
        };
        let mut bundle = bundle_with(payload(), preheat(), user(), options);
        apply_rule_effects(&WarnEveryEvent, &mut bundle);
        assert!(bundle.objects.event_rule_effects.is_empty());
    }
}
