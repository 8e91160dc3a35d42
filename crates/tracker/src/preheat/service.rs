use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::suppliers::default_suppliers;
use super::{PreheatSupplier, TrackerPreheat};
use crate::domain::TrackerPayload;
use crate::error::{PreheatError, TrackerResult};
use crate::identifier::{Identifiable, TrackerIdentifierParams};
use crate::store::TrackerStore;

/// Configuration of the supplier chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreheatConfig {
    /// Abort the preheat when a supplier fails. Off by default: the failure
    /// is logged, recorded on the preheat and the remaining suppliers run.
    pub fail_fast_on_error: bool,
}

/// Runs the supplier chain against one read snapshot.
pub struct TrackerPreheatService {
    suppliers: Vec<Box<dyn PreheatSupplier>>,
    config: PreheatConfig,
}

impl std::fmt::Debug for TrackerPreheatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerPreheatService")
            .field(
                "suppliers",
                &self.suppliers.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("config", &self.config)
            .finish()
    }
}

impl Default for TrackerPreheatService {
    fn default() -> Self {
        Self::new(PreheatConfig::default())
    }
}

impl TrackerPreheatService {
    /// Creates a service with the built-in suppliers.
    pub fn new(config: PreheatConfig) -> Self {
        Self::with_suppliers(config, default_suppliers())
    }

    /// Creates a service with an explicit supplier chain.
    pub fn with_suppliers(config: PreheatConfig, suppliers: Vec<Box<dyn PreheatSupplier>>) -> Self {
        Self { suppliers, config }
    }

    pub fn config(&self) -> &PreheatConfig {
        &self.config
    }

    /// Builds the preheat for a flattened payload.
    ///
    /// # Errors
    ///
    /// Returns [`PreheatError::MissingUser`] when `user_id` does not resolve,
    /// [`PreheatError::SupplierFailed`] when a supplier fails in fail-fast
    /// mode, and storage errors from opening the snapshot or loading defaults.
    pub async fn preheat(
        &self,
        store: &dyn TrackerStore,
        user_id: &str,
        identifiers: &TrackerIdentifierParams,
        payload: &TrackerPayload,
    ) -> TrackerResult<TrackerPreheat> {
        let started = Instant::now();
        let reader = store.begin_read().await?;
        let mut preheat = TrackerPreheat::new(identifiers.clone());

        let user = reader
            .find_user(user_id)
            .await?
            .ok_or_else(|| PreheatError::MissingUser {
                user: user_id.to_string(),
            })?;
        preheat.set_user(user);

        for default in reader.defaults().await? {
            debug!(kind = %default.kind(), uid = default.uid(), "Loaded default");
            preheat.put_default(default);
        }

        for supplier in &self.suppliers {
            let supplier_started = Instant::now();
            if let Err(err) = supplier.add(reader.as_ref(), payload, &mut preheat).await {
                if self.config.fail_fast_on_error {
                    return Err(PreheatError::SupplierFailed {
                        supplier: supplier.name().to_string(),
                        message: err.to_string(),
                    }
                    .into());
                }
                warn!(
                    supplier = supplier.name(),
                    error = %err,
                    "Preheat supplier failed, continuing without its objects"
                );
                preheat.record_failure(supplier.name(), err.to_string());
                continue;
            }
            debug!(
                supplier = supplier.name(),
                elapsed_ms = supplier_started.elapsed().as_millis() as u64,
                "Preheat supplier done"
            );
        }

        info!(
            user = user_id,
            backend = store.backend_name(),
            failed_suppliers = preheat.failed_suppliers().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Preheat completed"
        );
        Ok(preheat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Event;
    use crate::error::{BackendError, StorageError, StorageResult, TrackerError};
    use crate::model::{MetadataIdentity, MetadataObject, Program, ProgramStage};
    use crate::store::{InMemoryTrackerStore, TrackerReader};
    use crate::user::User;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct BrokenSupplier;

    #[async_trait]
    impl PreheatSupplier for BrokenSupplier {
        fn name(&self) -> &'static str {
            "BrokenSupplier"
        }

        async fn add(
            &self,
            _reader: &dyn TrackerReader,
            _payload: &TrackerPayload,
            _preheat: &mut TrackerPreheat,
        ) -> StorageResult<()> {
            Err(StorageError::Backend(BackendError::Internal {
                backend_name: "test".to_string(),
                message: "boom".to_string(),
                source: None,
            }))
        }
    }

    async fn store_with_user() -> InMemoryTrackerStore {
        let store = InMemoryTrackerStore::new();
        store.save_user(User::new("M5zQapPyTZI", "admin")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_missing_user_is_fatal() {
        let store = InMemoryTrackerStore::new();
        let result = TrackerPreheatService::default()
            .preheat(&store, "nobody", &Default::default(), &TrackerPayload::default())
            .await;
        assert!(matches!(
            result,
            Err(TrackerError::Preheat(PreheatError::MissingUser { .. }))
        ));
    }

    #[tokio::test]
    async fn test_best_effort_records_failure() {
        let store = store_with_user().await;
        let service = TrackerPreheatService::with_suppliers(
            PreheatConfig::default(),
            vec![Box::new(BrokenSupplier)],
        );
        let preheat = service
            .preheat(&store, "admin", &Default::default(), &TrackerPayload::default())
            .await
            .unwrap();
        assert_eq!(preheat.failed_suppliers().len(), 1);
        assert_eq!(preheat.user().unwrap().uid, "M5zQapPyTZI");
    }

    #[tokio::test]
    async fn test_fail_fast_aborts() {
        let store = store_with_user().await;
        let service = TrackerPreheatService::with_suppliers(
            PreheatConfig {
                fail_fast_on_error: true,
            },
            vec![Box::new(BrokenSupplier)],
        );
        let result = service
            .preheat(&store, "admin", &Default::default(), &TrackerPayload::default())
            .await;
        assert!(matches!(
            result,
            Err(TrackerError::Preheat(PreheatError::SupplierFailed { supplier, .. })) if supplier == "BrokenSupplier"
        ));
    }

    #[tokio::test]
    async fn test_unknown_references_leave_cache_empty() {
        let store = store_with_user().await;
        let payload = TrackerPayload {
            events: vec![Event {
                event: Some("ZwwuwNp6gVd".to_string()),
                program_stage: Some("A03MvHHogjR".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let preheat = TrackerPreheatService::default()
            .preheat(&store, "admin", &Default::default(), &payload)
            .await
            .unwrap();
        assert!(preheat.failed_suppliers().is_empty());
        assert!(preheat.get_event("ZwwuwNp6gVd").is_none());
    }

    #[tokio::test]
    async fn test_stage_brings_its_program() {
        let store = store_with_user().await;
        store
            .save_metadata(MetadataObject::Program(Arc::new(Program {
                identity: MetadataIdentity::new("IpHINAT79UW", "Child Programme"),
                ..Default::default()
            })))
            .await
            .unwrap();
        store
            .save_metadata(MetadataObject::ProgramStage(Arc::new(ProgramStage {
                identity: MetadataIdentity::new("A03MvHHogjR", "Birth"),
                program: "IpHINAT79UW".to_string(),
                ..Default::default()
            })))
            .await
            .unwrap();
        let payload = TrackerPayload {
            events: vec![Event {
                event: Some("ZwwuwNp6gVd".to_string()),
                program_stage: Some("A03MvHHogjR".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };

        let preheat = TrackerPreheatService::default()
            .preheat(&store, "admin", &Default::default(), &payload)
            .await
            .unwrap();
        assert!(preheat.get_by_uid::<ProgramStage>("A03MvHHogjR").is_some());
        assert!(preheat.get_by_uid::<Program>("IpHINAT79UW").is_some());
    }
}
