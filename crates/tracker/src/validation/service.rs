use std::time::Instant;

use tracing::{debug, info};

use super::{TrackerValidationReport, ValidationErrorReporter, ValidationHook, default_hooks};
use crate::bundle::TrackerBundle;
use crate::options::ValidationMode;

/// Runs the hook chain over a bundle.
pub struct TrackerValidationService {
    hooks: Vec<Box<dyn ValidationHook>>,
}

impl std::fmt::Debug for TrackerValidationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerValidationService")
            .field("hooks", &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl Default for TrackerValidationService {
    fn default() -> Self {
        Self::new(default_hooks())
    }
}

impl TrackerValidationService {
    /// Creates a service running `hooks` in ascending order.
    pub fn new(mut hooks: Vec<Box<dyn ValidationHook>>) -> Self {
        hooks.sort_by_key(|hook| hook.order());
        Self { hooks }
    }

    /// Adds a hook, keeping the chain ordered.
    pub fn with_hook(mut self, hook: Box<dyn ValidationHook>) -> Self {
        self.hooks.push(hook);
        self.hooks.sort_by_key(|hook| hook.order());
        self
    }

    /// Hook names in execution order.
    pub fn hook_names(&self) -> Vec<&'static str> {
        self.hooks.iter().map(|hook| hook.name()).collect()
    }

    /// Validates the bundle.
    ///
    /// `SKIP` returns an empty report without running any hook. `FAIL_FAST`
    /// keeps the first error of each object.
    pub fn validate(&self, bundle: &TrackerBundle) -> TrackerValidationReport {
        let mode = bundle.config.options.validation_mode;
        if mode == ValidationMode::Skip {
            info!(bundle_size = bundle.bundle_size(), "Validation skipped");
            return TrackerValidationReport::default();
        }

        let started = Instant::now();
        let is_delete = bundle.strategy().is_delete();
        let mut reporter = ValidationErrorReporter::new(mode == ValidationMode::FailFast);

        for hook in &self.hooks {
            if is_delete && !hook.applies_to_delete() {
                continue;
            }
            let hook_started = Instant::now();
            reporter.set_validator(hook.name());
            hook.validate(bundle, &mut reporter);
            debug!(
                hook = hook.name(),
                order = hook.order(),
                errors = reporter.report().errors.len(),
                elapsed_ms = hook_started.elapsed().as_millis() as u64,
                "Validation hook done"
            );
        }

        let report = reporter.into_report();
        info!(
            mode = %mode,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Validation completed"
        );
        report
    }
}
