//! Validation findings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::TrackerType;

macro_rules! error_codes {
    ($($code:ident => $message:literal,)+) => {
        /// Coded validation finding.
        ///
        /// Each code carries a message template; `{0}`, `{1}`, ... are
        /// replaced by the report arguments.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum TrackerErrorCode {
            $($code,)+
        }

        impl TrackerErrorCode {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(TrackerErrorCode::$code => stringify!($code),)+
                }
            }

            /// The message template of this code.
            pub fn template(&self) -> &'static str {
                match self {
                    $(TrackerErrorCode::$code => $message,)+
                }
            }
        }
    };
}

error_codes! {
    E1000 => "User: `{0}`, has no write access to OrganisationUnit: `{1}`.",
    E1002 => "TrackedEntity: `{0}`, already exists.",
    E1005 => "Could not find TrackedEntityType: `{0}`.",
    E1006 => "Attribute: `{0}`, does not exist.",
    E1007 => "Error validating attribute value type: `{0}`; Error: `{1}`.",
    E1008 => "Value: `{0}`, does not match the attribute pattern: `{1}`.",
    E1010 => "Could not find Program: `{0}`, linked to Event.",
    E1011 => "Could not find OrganisationUnit: `{0}`, linked to Event.",
    E1013 => "Could not find ProgramStage: `{0}`, linked to Event.",
    E1017 => "Attribute: `{0}`, does not exist.",
    E1018 => "Attribute: `{0}`, is mandatory in program `{1}` but not declared in enrollment `{2}`.",
    E1019 => "Only Program attributes is allowed for enrollment; Non valid attributes: `{0}`.",
    E1030 => "Event: `{0}`, already exists.",
    E1031 => "Event OccurredAt date is missing.",
    E1032 => "Event: `{0}`, does not exist.",
    E1033 => "Event: `{0}`, Enrollment value is NULL.",
    E1048 => "Object: `{0}`, uid: `{1}`, has an invalid uid format.",
    E1049 => "Could not find OrganisationUnit: `{0}`, linked to Tracked Entity.",
    E1050 => "Event ScheduledAt date is missing.",
    E1051 => "Invalid event date: `{0}`.",
    E1063 => "TrackedEntity: `{0}`, does not exist.",
    E1064 => "Non-unique attribute value `{0}` for attribute `{1}`.",
    E1068 => "Could not find TrackedEntity: `{0}`, linked to Enrollment.",
    E1069 => "Could not find Program: `{0}`, linked to Enrollment.",
    E1070 => "Could not find OrganisationUnit: `{0}`, linked to Enrollment.",
    E1075 => "Attribute: `{0}`, is missing uid.",
    E1076 => "Attribute: `{0}`, value is null.",
    E1080 => "Enrollment: `{0}`, already exists.",
    E1081 => "Enrollment: `{0}`, does not exist.",
    E1082 => "Event: `{0}`, is already deleted and can't be modified.",
    E1090 => "Attribute: `{0}`, is mandatory in tracked entity type `{1}` but not declared in tracked entity `{2}`.",
    E1113 => "Enrollment: `{0}`, is already deleted and can't be modified.",
    E1114 => "TrackedEntity: `{0}`, is already deleted and can't be modified.",
    E1115 => "Could not find CategoryOptionCombo: `{0}`.",
    E1118 => "Assigned user `{0}` is not a valid user.",
    E1121 => "Missing required tracked entity property: `{0}`.",
    E1122 => "Missing required enrollment property: `{0}`.",
    E1123 => "Missing required event property: `{0}`.",
    E1124 => "Missing required relationship property: `{0}`.",
    E1300 => "Generated by program rule (`{0}`) - `{1}`.",
    E1301 => "Generated by program rule (`{0}`) - `{1}`.",
    E1302 => "DataElement `{0}` value `{1}` is invalid: `{2}`.",
    E1303 => "Mandatory DataElement `{0}` is not present.",
    E1304 => "Could not find DataElement: `{0}`.",
    E4000 => "Relationship: `{0}` cannot link to itself.",
    E4001 => "Relationship item `{0}` for relationship `{1}` is invalid: an item can link only one tracker object.",
    E4006 => "Could not find RelationshipType: `{0}`.",
    E4012 => "Could not find `{0}`: `{1}`, linked to Relationship.",
    E4015 => "Relationship: `{0}`, already exists.",
    E4016 => "Relationship: `{0}`, does not exist.",
    E4017 => "Relationship: `{0}`, is already deleted and can't be modified.",
    E9000 => "Preheat supplier `{0}` failed: `{1}`.",
}

impl fmt::Display for TrackerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders a message template with positional arguments.
pub fn render(template: &str, args: &[String]) -> String {
    args.iter()
        .enumerate()
        .fold(template.to_string(), |message, (index, arg)| {
            message.replace(&format!("{{{}}}", index), arg)
        })
}

/// Whether a finding blocks the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Error,
    Warning,
}

/// One validation finding on one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerErrorReport {
    pub error_code: TrackerErrorCode,
    pub severity: Severity,
    pub tracker_type: TrackerType,
    /// UID of the offending object.
    pub uid: String,
    /// Name of the hook that produced the finding.
    pub validator: String,
    pub args: Vec<String>,
    pub message: String,
}

impl TrackerErrorReport {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Accumulated findings of a validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerValidationReport {
    pub errors: Vec<TrackerErrorReport>,
    pub warnings: Vec<TrackerErrorReport>,
}

impl TrackerValidationReport {
    /// Adds a finding to the errors or warnings, by severity.
    pub fn add(&mut self, report: TrackerErrorReport) {
        match report.severity {
            Severity::Error => self.errors.push(report),
            Severity::Warning => self.warnings.push(report),
        }
    }

    pub fn extend(&mut self, reports: impl IntoIterator<Item = TrackerErrorReport>) {
        for report in reports {
            self.add(report);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Findings for one object.
    pub fn errors_for<'a>(
        &'a self,
        tracker_type: TrackerType,
        uid: &'a str,
    ) -> impl Iterator<Item = &'a TrackerErrorReport> + 'a {
        self.errors
            .iter()
            .filter(move |e| e.tracker_type == tracker_type && e.uid == uid)
    }

    /// Returns `true` if any error uses `code`.
    pub fn has_error(&self, code: TrackerErrorCode) -> bool {
        self.errors.iter().any(|e| e.error_code == code)
    }

    /// Objects with at least one error.
    pub fn invalid_objects(&self) -> std::collections::HashSet<(TrackerType, String)> {
        self.errors
            .iter()
            .map(|e| (e.tracker_type, e.uid.clone()))
            .collect()
    }
}
