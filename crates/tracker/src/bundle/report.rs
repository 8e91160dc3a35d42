//! Reports returned by an import.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::TrackerType;
use crate::model::RuleAction;
use crate::options::TrackerReportMode;
use crate::store::WriteAction;
use crate::validation::TrackerValidationReport;

/// Overall outcome of an import or commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackerStatus {
    #[default]
    Ok,
    Warning,
    Error,
}

/// Object counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Objects that were not persisted.
    pub ignored: usize,
}

impl TrackerStats {
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted + self.ignored
    }

    pub fn merge(&mut self, other: &TrackerStats) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.ignored += other.ignored;
    }

    /// Counts one applied write.
    pub fn record(&mut self, action: WriteAction) {
        match action {
            WriteAction::Create => self.created += 1,
            WriteAction::Update => self.updated += 1,
            WriteAction::Delete => self.deleted += 1,
        }
    }
}

/// An object the commit could not persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitFailure {
    pub uid: String,
    pub action: WriteAction,
    pub message: String,
}

/// Commit outcome for one tracker type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerTypeReport {
    pub tracker_type: TrackerType,
    pub stats: TrackerStats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<CommitFailure>,
}

impl TrackerTypeReport {
    pub fn new(tracker_type: TrackerType) -> Self {
        Self {
            tracker_type,
            stats: TrackerStats::default(),
            failures: Vec::new(),
        }
    }
}

/// A rule effect carried out after commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSideEffect {
    pub tracker_type: TrackerType,
    pub uid: String,
    pub rule: String,
    pub action: RuleAction,
}

/// Outcome of the commit stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerBundleReport {
    pub status: TrackerStatus,
    pub type_reports: BTreeMap<TrackerType, TrackerTypeReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub side_effects: Vec<TrackerSideEffect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TrackerBundleReport {
    /// The report of one type, created on first use.
    pub fn type_report_mut(&mut self, tracker_type: TrackerType) -> &mut TrackerTypeReport {
        self.type_reports
            .entry(tracker_type)
            .or_insert_with(|| TrackerTypeReport::new(tracker_type))
    }

    /// Counts over all types.
    pub fn stats(&self) -> TrackerStats {
        let mut stats = TrackerStats::default();
        for report in self.type_reports.values() {
            stats.merge(&report.stats);
        }
        stats
    }

    pub fn stats_for(&self, tracker_type: TrackerType) -> TrackerStats {
        self.type_reports
            .get(&tracker_type)
            .map(|report| report.stats)
            .unwrap_or_default()
    }

    /// Marks `count` objects of a type as ignored.
    pub fn ignore(&mut self, tracker_type: TrackerType, count: usize) {
        if count > 0 {
            self.type_report_mut(tracker_type).stats.ignored += count;
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status != TrackerStatus::Error
    }
}

/// Elapsed milliseconds per stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerTimings {
    pub normalize: u64,
    pub preheat: u64,
    pub convert: u64,
    pub rule_engine: u64,
    pub validation: u64,
    pub commit: u64,
    pub total: u64,
}

/// Everything an import returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerImportReport {
    pub status: TrackerStatus,
    pub stats: TrackerStats,
    pub validation_report: TrackerValidationReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_report: Option<TrackerBundleReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timings: Option<TrackerTimings>,
}

impl TrackerImportReport {
    /// Assembles the report of a finished import.
    ///
    /// `ignored` counts the objects that never reached the commit stage, per
    /// type. The status is `Error` when validation found errors or the
    /// commit failed, `Warning` when there are warnings, otherwise `Ok`.
    pub fn new(
        validation_report: TrackerValidationReport,
        bundle_report: Option<TrackerBundleReport>,
        ignored: &BTreeMap<TrackerType, usize>,
        timings: TrackerTimings,
    ) -> Self {
        let mut bundle_report = bundle_report;
        if let Some(report) = bundle_report.as_mut() {
            for (tracker_type, count) in ignored {
                report.ignore(*tracker_type, *count);
            }
        }

        let mut stats = bundle_report
            .as_ref()
            .map(TrackerBundleReport::stats)
            .unwrap_or_default();
        if bundle_report.is_none() {
            stats.ignored = ignored.values().sum();
        }

        let status = if validation_report.has_errors()
            || bundle_report.as_ref().is_some_and(|report| !report.is_ok())
        {
            TrackerStatus::Error
        } else if !validation_report.warnings.is_empty() {
            TrackerStatus::Warning
        } else {
            TrackerStatus::Ok
        };

        Self {
            status,
            stats,
            validation_report,
            bundle_report,
            timings: Some(timings),
        }
    }

    /// Trims the report to what `mode` asks for.
    ///
    /// `ERRORS` drops warnings and timings, `WARNINGS` drops timings, `FULL`
    /// keeps everything.
    pub fn with_report_mode(mut self, mode: TrackerReportMode) -> Self {
        match mode {
            TrackerReportMode::Errors => {
                self.validation_report.warnings.clear();
                self.timings = None;
            }
            TrackerReportMode::Warnings => self.timings = None,
            TrackerReportMode::Full => {}
        }
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status != TrackerStatus::Error
    }
}
