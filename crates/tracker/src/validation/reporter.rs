use std::collections::HashMap;

use super::report::{Severity, TrackerErrorCode, TrackerErrorReport, TrackerValidationReport, render};
use crate::domain::TrackerType;

/// Collects the findings of the hooks of one validation run.
///
/// Findings are stamped with the name of the hook currently running. The
/// reporter counts errors per object; in fail-fast mode only the first error
/// of each object is kept and [`is_invalid`](Self::is_invalid) lets hooks skip
/// objects that already failed.
#[derive(Debug)]
pub struct ValidationErrorReporter {
    fail_fast: bool,
    validator: &'static str,
    error_counts: HashMap<(TrackerType, String), usize>,
    report: TrackerValidationReport,
}

impl ValidationErrorReporter {
    pub fn new(fail_fast: bool) -> Self {
        Self {
            fail_fast,
            validator: "",
            error_counts: HashMap::new(),
            report: TrackerValidationReport::default(),
        }
    }

    /// Scopes subsequent findings to `validator`.
    pub fn set_validator(&mut self, validator: &'static str) {
        self.validator = validator;
    }

    pub fn is_fail_fast(&self) -> bool {
        self.fail_fast
    }

    /// Returns `true` if the object already has an error.
    pub fn is_invalid(&self, tracker_type: TrackerType, uid: &str) -> bool {
        self.error_count(tracker_type, uid) > 0
    }

    /// Number of errors recorded for the object.
    pub fn error_count(&self, tracker_type: TrackerType, uid: &str) -> usize {
        self.error_counts
            .get(&(tracker_type, uid.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Records an error.
    pub fn add_error<S: ToString>(
        &mut self,
        tracker_type: TrackerType,
        uid: &str,
        code: TrackerErrorCode,
        args: impl IntoIterator<Item = S>,
    ) {
        let count = self
            .error_counts
            .entry((tracker_type, uid.to_string()))
            .or_insert(0);
        *count += 1;
        if self.fail_fast && *count > 1 {
            return;
        }
        let report = self.build(Severity::Error, tracker_type, uid, code, args);
        self.report.add(report);
    }

    /// Records a warning. Warnings never invalidate an object.
    pub fn add_warning<S: ToString>(
        &mut self,
        tracker_type: TrackerType,
        uid: &str,
        code: TrackerErrorCode,
        args: impl IntoIterator<Item = S>,
    ) {
        let report = self.build(Severity::Warning, tracker_type, uid, code, args);
        self.report.add(report);
    }

    fn build<S: ToString>(
        &self,
        severity: Severity,
        tracker_type: TrackerType,
        uid: &str,
        code: TrackerErrorCode,
        args: impl IntoIterator<Item = S>,
    ) -> TrackerErrorReport {
        let args: Vec<String> = args.into_iter().map(|arg| arg.to_string()).collect();
        TrackerErrorReport {
            error_code: code,
            severity,
            tracker_type,
            uid: uid.to_string(),
            validator: self.validator.to_string(),
            message: render(code.template(), &args),
            args,
        }
    }

    pub fn report(&self) -> &TrackerValidationReport {
        &self.report
    }

    pub fn into_report(self) -> TrackerValidationReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fail_fast_keeps_first_error_per_object() {
        let mut reporter = ValidationErrorReporter::new(true);
        reporter.set_validator("MandatoryValidationHook");
        reporter.add_error(TrackerType::Event, "ZwwuwNp6gVd", TrackerErrorCode::E1123, ["orgUnit"]);
        reporter.add_error(TrackerType::Event, "ZwwuwNp6gVd", TrackerErrorCode::E1123, ["programStage"]);
        reporter.add_error(TrackerType::Event, "PwwuwNp6gVd", TrackerErrorCode::E1123, ["orgUnit"]);

        assert_eq!(reporter.error_count(TrackerType::Event, "ZwwuwNp6gVd"), 2);
        let report = reporter.into_report();
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].validator, "MandatoryValidationHook");
        assert_eq!(report.errors[0].message, "Missing required event property: `orgUnit`.");
    }

    #[test]
    fn test_warnings_do_not_invalidate() {
        let mut reporter = ValidationErrorReporter::new(false);
        reporter.add_warning(TrackerType::Enrollment, "MNWZ6hnuhSw", TrackerErrorCode::E1301, ["rule", "check"]);
        assert!(!reporter.is_invalid(TrackerType::Enrollment, "MNWZ6hnuhSw"));
        assert_eq!(reporter.report().warnings.len(), 1);
    }
}
