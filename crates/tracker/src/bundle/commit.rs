use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::report::{CommitFailure, TrackerBundleReport, TrackerSideEffect, TrackerStatus};
use super::TrackerBundle;
use crate::domain::{TrackerDto, TrackerType};
use crate::error::{CommitError, TrackerResult};
use crate::options::{AtomicMode, FlushMode, TrackerImportStrategy};
use crate::store::{Persistable, TrackerStore, TrackerTransaction, WriteOperation, WriteOutcome};

/// Writes a validated bundle inside one transaction.
///
/// Creates and updates run parent first, deletions child first. In
/// [`AtomicMode::All`] the first failing write rolls the whole bundle back;
/// in [`AtomicMode::Object`] failing objects are recorded and skipped.
/// [`FlushMode::Auto`] flushes once per type, [`FlushMode::Object`] after
/// every write.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackerBundleCommitter;

impl TrackerBundleCommitter {
    pub fn new() -> Self {
        Self
    }

    /// The writes for one type, in bundle order.
    pub fn plan(&self, bundle: &TrackerBundle, tracker_type: TrackerType) -> Vec<WriteOperation> {
        match tracker_type {
            TrackerType::TrackedEntity => operations(
                bundle,
                bundle.tracked_entities(),
                |uid| bundle.objects.converted.tracked_entities.get(uid).cloned().map(Persistable::TrackedEntity),
            ),
            TrackerType::Enrollment => operations(
                bundle,
                bundle.enrollments(),
                |uid| bundle.objects.converted.enrollments.get(uid).cloned().map(Persistable::Enrollment),
            ),
            TrackerType::Event => operations(
                bundle,
                bundle.events(),
                |uid| bundle.objects.converted.events.get(uid).cloned().map(Persistable::Event),
            ),
            TrackerType::Relationship => operations(
                bundle,
                bundle.relationships(),
                |uid| bundle.objects.converted.relationships.get(uid).cloned().map(Persistable::Relationship),
            ),
        }
    }

    /// Commits the bundle.
    ///
    /// # Errors
    ///
    /// Returns storage errors raised by the transaction itself. Failing
    /// writes are not errors: they end up in the returned report.
    pub async fn commit(
        &self,
        store: &dyn TrackerStore,
        bundle: &TrackerBundle,
    ) -> TrackerResult<TrackerBundleReport> {
        let started = Instant::now();
        let options = &bundle.config.options;
        let order = if bundle.strategy().is_delete() {
            TrackerType::DELETE_ORDER
        } else {
            TrackerType::ALL
        };

        let mut report = TrackerBundleReport::default();
        let mut tx = store.begin_write().await?;

        for tracker_type in order {
            let operations = self.plan(bundle, tracker_type);
            if operations.is_empty() {
                continue;
            }

            let outcomes = match flush(tx.as_mut(), operations, options.flush_mode).await {
                Ok(outcomes) => outcomes,
                Err(err) => {
                    tx.rollback().await?;
                    return Err(err);
                }
            };

            let type_report = report.type_report_mut(tracker_type);
            for outcome in outcomes {
                let WriteOutcome {
                    uid, action, error, ..
                } = outcome;
                let Some(message) = error else {
                    type_report.stats.record(action);
                    continue;
                };

                if options.atomic_mode == AtomicMode::All {
                    tx.rollback().await?;
                    let err = CommitError::RolledBack {
                        tracker_type,
                        uid,
                        reason: message,
                    };
                    error!(error = %err, bundle_size = bundle.bundle_size(), "Bundle rolled back");
                    return Ok(rolled_back(bundle, err));
                }

                warn!(
                    tracker_type = %tracker_type,
                    uid = uid.as_str(),
                    error = message.as_str(),
                    "Object not persisted"
                );
                type_report.stats.ignored += 1;
                type_report.failures.push(CommitFailure {
                    uid,
                    action,
                    message,
                });
            }

            debug!(
                tracker_type = %tracker_type,
                created = type_report.stats.created,
                updated = type_report.stats.updated,
                deleted = type_report.stats.deleted,
                ignored = type_report.stats.ignored,
                "Committed tracker type"
            );
        }

        let owners = owner_updates(bundle);
        if !owners.is_empty() {
            let outcomes = match flush(tx.as_mut(), owners, options.flush_mode).await {
                Ok(outcomes) => outcomes,
                Err(err) => {
                    tx.rollback().await?;
                    return Err(err);
                }
            };
            for WriteOutcome { uid, error, .. } in outcomes {
                let Some(message) = error else {
                    continue;
                };
                if options.atomic_mode == AtomicMode::All {
                    tx.rollback().await?;
                    let err = CommitError::RolledBack {
                        tracker_type: TrackerType::TrackedEntity,
                        uid,
                        reason: message,
                    };
                    error!(error = %err, bundle_size = bundle.bundle_size(), "Bundle rolled back");
                    return Ok(rolled_back(bundle, err));
                }
                warn!(
                    uid = uid.as_str(),
                    error = message.as_str(),
                    "Enrollment attributes not persisted"
                );
            }
        }

        tx.commit().await?;

        if !options.skip_side_effects {
            report.side_effects = side_effects(bundle, &report);
        }
        if report.type_reports.values().any(|r| !r.failures.is_empty()) {
            report.status = TrackerStatus::Warning;
        }

        let stats = report.stats();
        info!(
            created = stats.created,
            updated = stats.updated,
            deleted = stats.deleted,
            ignored = stats.ignored,
            side_effects = report.side_effects.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Bundle committed"
        );
        Ok(report)
    }
}

fn operations<T: TrackerDto>(
    bundle: &TrackerBundle,
    objects: &[T],
    converted: impl Fn(&str) -> Option<Persistable>,
) -> Vec<WriteOperation> {
    let strategy = bundle.strategy();
    objects
        .iter()
        .filter_map(|object| {
            let uid = object.uid();
            let delete = strategy.is_delete()
                || (strategy == TrackerImportStrategy::Sync && object.is_deleted());
            if delete {
                return Some(WriteOperation::Delete {
                    tracker_type: T::TRACKER_TYPE,
                    uid: uid.to_string(),
                });
            }
            let persistable = converted(uid)?;
            let update = match strategy {
                TrackerImportStrategy::Update => true,
                TrackerImportStrategy::Create => false,
                _ => bundle.preheat.exists(T::TRACKER_TYPE, uid),
            };
            Some(if update {
                WriteOperation::Update(persistable)
            } else {
                WriteOperation::Create(persistable)
            })
        })
        .collect()
}

/// Updates of stored tracked entities changed only by enrollment attributes.
/// They are written but not counted: the payload did not send them.
fn owner_updates(bundle: &TrackerBundle) -> Vec<WriteOperation> {
    let mut owners: Vec<_> = bundle.objects.converted.enrollment_owners.values().collect();
    owners.sort_by(|a, b| a.uid.cmp(&b.uid));
    owners
        .into_iter()
        .cloned()
        .map(|tei| WriteOperation::Update(Persistable::TrackedEntity(tei)))
        .collect()
}

async fn flush(
    tx: &mut dyn TrackerTransaction,
    operations: Vec<WriteOperation>,
    mode: FlushMode,
) -> TrackerResult<Vec<WriteOutcome>> {
    match mode {
        FlushMode::Auto => {
            for operation in operations {
                tx.stage(operation);
            }
            Ok(tx.flush().await?)
        }
        FlushMode::Object => {
            let mut outcomes = Vec::with_capacity(operations.len());
            for operation in operations {
                tx.stage(operation);
                outcomes.extend(tx.flush().await?);
            }
            Ok(outcomes)
        }
    }
}

/// The report of a bundle whose commit was rolled back: nothing persisted.
fn rolled_back(bundle: &TrackerBundle, err: CommitError) -> TrackerBundleReport {
    let mut report = TrackerBundleReport {
        status: TrackerStatus::Error,
        message: Some(err.to_string()),
        ..Default::default()
    };
    for tracker_type in TrackerType::ALL {
        report.ignore(tracker_type, bundle.uids(tracker_type).len());
    }
    report
}

/// Side effects of the enrollments and events that were persisted.
fn side_effects(bundle: &TrackerBundle, report: &TrackerBundleReport) -> Vec<TrackerSideEffect> {
    let failed = |tracker_type: TrackerType, uid: &str| {
        report
            .type_reports
            .get(&tracker_type)
            .is_some_and(|r| r.failures.iter().any(|f| f.uid == uid))
    };

    let mut side_effects = Vec::new();
    for (tracker_type, effects) in [
        (TrackerType::Enrollment, &bundle.objects.enrollment_rule_effects),
        (TrackerType::Event, &bundle.objects.event_rule_effects),
    ] {
        for uid in bundle.uids(tracker_type) {
            if failed(tracker_type, &uid) {
                continue;
            }
            let Some(effects) = effects.get(&uid) else {
                continue;
            };
            side_effects.extend(effects.iter().filter(|e| e.is_side_effect()).map(|effect| {
                TrackerSideEffect {
                    tracker_type,
                    uid: uid.clone(),
                    rule: effect.rule.clone(),
                    action: effect.action.clone(),
                }
            }));
        }
    }
    side_effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Event, TrackerPayload};
    use crate::model::{RuleAction, RuleEffect};
    use crate::options::TrackerImportOptions;
    use crate::store::{InMemoryTrackerStore, WriteAction};
    use crate::validation::hooks::testing::{ORG_UNIT, STAGE, bundle_with, preheat, user};

    fn events(uids: &[&str]) -> TrackerPayload {
        TrackerPayload {
            events: uids
                .iter()
                .map(|uid| Event {
                    program_stage: Some(STAGE.to_string()),
                    org_unit: Some(ORG_UNIT.to_string()),
                    occurred_at: Some("2021-03-01".to_string()),
                    ..Event::new(*uid)
                })
                .collect(),
            ..Default::default()
        }
    }

    fn options(atomic_mode: AtomicMode, flush_mode: FlushMode) -> TrackerImportOptions {
        TrackerImportOptions {
            atomic_mode,
            flush_mode,
            ..Default::default()
        }
    }

    const UIDS: [&str; 3] = ["ZwwuwNp6gVd", "XwwuwNp6gVd", "YwwuwNp6gVd"];

    #[tokio::test]
    async fn test_all_mode_rolls_back_everything() {
        let store = InMemoryTrackerStore::new();
        store.fail_on(TrackerType::Event, UIDS[1]);
        let bundle = bundle_with(events(&UIDS), preheat(), user(), options(AtomicMode::All, FlushMode::Auto));

        let report = TrackerBundleCommitter::new().commit(&store, &bundle).await.unwrap();
        assert_eq!(report.status, TrackerStatus::Error);
        assert!(report.message.as_deref().is_some_and(|m| m.contains(UIDS[1])));
        assert_eq!(report.stats().ignored, 3);
        assert_eq!(store.count(TrackerType::Event), 0);
    }

    #[tokio::test]
    async fn test_object_mode_skips_failures() {
        for flush_mode in [FlushMode::Auto, FlushMode::Object] {
            let store = InMemoryTrackerStore::new();
            store.fail_on(TrackerType::Event, UIDS[1]);
            let bundle = bundle_with(events(&UIDS), preheat(), user(), options(AtomicMode::Object, flush_mode));

            let report = TrackerBundleCommitter::new().commit(&store, &bundle).await.unwrap();
            let events = &report.type_reports[&TrackerType::Event];
            assert_eq!(events.stats.created, 2);
            assert_eq!(events.stats.ignored, 1);
            assert_eq!(events.failures[0].uid, UIDS[1]);
            assert_eq!(events.failures[0].action, WriteAction::Create);
            assert_eq!(store.count(TrackerType::Event), 2);
        }
    }

    #[tokio::test]
    async fn test_side_effects_of_persisted_objects() {
        let store = InMemoryTrackerStore::new();
        let mut bundle = bundle_with(events(&UIDS[..1]), preheat(), user(), TrackerImportOptions::default());
        bundle.objects.event_rule_effects.insert(
            UIDS[0].to_string(),
            vec![
                RuleEffect::new("rUle0000001", RuleAction::SendMessage { notification: "nOtif000001".to_string() }),
                RuleEffect::new("rUle0000002", RuleAction::ShowWarning { content: "Check".to_string() }),
            ],
        );

        let report = TrackerBundleCommitter::new().commit(&store, &bundle).await.unwrap();
        assert_eq!(report.side_effects.len(), 1);
        assert_eq!(report.side_effects[0].rule, "rUle0000001");

        bundle.config.options.skip_side_effects = true;
        bundle.config.options.import_strategy = TrackerImportStrategy::Update;
        let report = TrackerBundleCommitter::new().commit(&store, &bundle).await.unwrap();
        assert!(report.side_effects.is_empty());
        assert_eq!(report.stats_for(TrackerType::Event).updated, 1);
    }
}
