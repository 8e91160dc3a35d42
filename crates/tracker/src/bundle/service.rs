use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::commit::TrackerBundleCommitter;
use super::report::{TrackerImportReport, TrackerTimings};
use super::{BundleConfig, BundleObjects, TrackerBundle};
use crate::domain::TrackerType;
use crate::error::{PreheatError, TrackerResult};
use crate::normalize::{normalize, verify};
use crate::options::{AtomicMode, TrackerImportMode, TrackerImportParams};
use crate::preheat::TrackerPreheatService;
use crate::rules::{NoopRuleEngine, RuleEngine, apply_rule_effects};
use crate::store::TrackerStore;
use crate::validation::TrackerValidationService;

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Runs imports end to end: normalize, preheat, convert, rules, validate,
/// commit.
///
/// One import runs its stages strictly in sequence. The service holds no
/// per-import state, so one instance serves concurrent imports.
pub struct TrackerImportService {
    store: Arc<dyn TrackerStore>,
    preheat_service: TrackerPreheatService,
    validation_service: TrackerValidationService,
    rule_engine: Box<dyn RuleEngine>,
    committer: TrackerBundleCommitter,
}

impl std::fmt::Debug for TrackerImportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerImportService")
            .field("store", &self.store.backend_name())
            .field("preheat_service", &self.preheat_service)
            .field("validation_service", &self.validation_service)
            .field("rule_engine", &self.rule_engine.name())
            .finish()
    }
}

impl TrackerImportService {
    /// Creates a service with the built-in suppliers and hooks and no rules.
    pub fn new(store: Arc<dyn TrackerStore>) -> Self {
        Self {
            store,
            preheat_service: TrackerPreheatService::default(),
            validation_service: TrackerValidationService::default(),
            rule_engine: Box::new(NoopRuleEngine),
            committer: TrackerBundleCommitter::new(),
        }
    }

    pub fn with_preheat_service(mut self, preheat_service: TrackerPreheatService) -> Self {
        self.preheat_service = preheat_service;
        self
    }

    pub fn with_validation_service(mut self, validation_service: TrackerValidationService) -> Self {
        self.validation_service = validation_service;
        self
    }

    pub fn with_rule_engine(mut self, rule_engine: Box<dyn RuleEngine>) -> Self {
        self.rule_engine = rule_engine;
        self
    }

    pub fn store(&self) -> &Arc<dyn TrackerStore> {
        &self.store
    }

    /// Imports a payload.
    ///
    /// Validation findings never fail the import: they are returned in the
    /// report. With [`AtomicMode::All`] any error keeps the whole bundle from
    /// being committed; with [`AtomicMode::Object`] only the invalid objects
    /// and their dependents are dropped.
    ///
    /// # Errors
    ///
    /// Returns payload errors from normalization, preheat errors (unknown
    /// user, supplier failure in fail-fast mode) and storage errors.
    pub async fn import(&self, params: TrackerImportParams) -> TrackerResult<TrackerImportReport> {
        let started = Instant::now();
        let mut timings = TrackerTimings::default();
        let TrackerImportParams {
            user_id,
            options,
            payload,
        } = params;

        let stage = Instant::now();
        let payload = normalize(payload);
        verify(&payload)?;
        timings.normalize = elapsed_ms(stage);

        let stage = Instant::now();
        let preheat = self
            .preheat_service
            .preheat(self.store.as_ref(), &user_id, &options.identifiers, &payload)
            .await?;
        timings.preheat = elapsed_ms(stage);

        let user = preheat
            .user()
            .cloned()
            .ok_or_else(|| PreheatError::MissingUser { user: user_id.clone() })?;
        let mut bundle = TrackerBundle {
            config: BundleConfig { user, options },
            preheat,
            objects: BundleObjects::from_payload(payload),
        };
        info!(
            user = user_id.as_str(),
            strategy = bundle.strategy().as_str(),
            atomic_mode = bundle.config.options.atomic_mode.as_str(),
            bundle_size = bundle.bundle_size(),
            "Tracker import started"
        );

        let stage = Instant::now();
        bundle.convert();
        timings.convert = elapsed_ms(stage);

        let stage = Instant::now();
        apply_rule_effects(self.rule_engine.as_ref(), &mut bundle);
        timings.rule_engine = elapsed_ms(stage);

        let stage = Instant::now();
        let validation_report = self.validation_service.validate(&bundle);
        timings.validation = elapsed_ms(stage);

        let mut ignored: BTreeMap<TrackerType, usize> = BTreeMap::new();
        let mut commit = bundle.config.options.import_mode == TrackerImportMode::Commit;
        if validation_report.has_errors() {
            match bundle.config.options.atomic_mode {
                AtomicMode::All => {
                    for tracker_type in TrackerType::ALL {
                        let count = bundle.uids(tracker_type).len();
                        if count > 0 {
                            ignored.insert(tracker_type, count);
                        }
                    }
                    commit = false;
                }
                AtomicMode::Object => {
                    let removed = bundle.remove_invalid(&validation_report.invalid_objects());
                    for (tracker_type, _) in removed {
                        *ignored.entry(tracker_type).or_default() += 1;
                    }
                }
            }
            warn!(
                errors = validation_report.errors.len(),
                ignored = ignored.values().sum::<usize>(),
                "Validation found errors"
            );
        }

        let stage = Instant::now();
        let bundle_report = if commit && !bundle.is_empty() {
            bundle.merge_enrollment_attributes();
            Some(self.committer.commit(self.store.as_ref(), &bundle).await?)
        } else {
            None
        };
        timings.commit = elapsed_ms(stage);
        timings.total = elapsed_ms(started);

        let report = TrackerImportReport::new(validation_report, bundle_report, &ignored, timings);
        info!(
            user = user_id.as_str(),
            status = ?report.status,
            created = report.stats.created,
            updated = report.stats.updated,
            deleted = report.stats.deleted,
            ignored = report.stats.ignored,
            elapsed_ms = timings.total,
            "Tracker import finished"
        );
        Ok(report.with_report_mode(bundle.config.options.report_mode))
    }
}
