//! DHIS2 Tracker import pipeline
//!
//! This crate imports tracker payloads (tracked entities, enrollments, events
//! and relationships) into a tracker store. An import runs five stages in
//! sequence over one bundle:
//!
//! 1. **Normalize** - flatten nested payloads, generate missing UIDs and
//!    backfill parent references ([`normalize`]).
//! 2. **Preheat** - bulk-load every referenced metadata object and stored
//!    tracker object from one read snapshot ([`preheat`]).
//! 3. **Convert** - turn wire objects into persistable ones, merging with
//!    stored state ([`converter`]).
//! 4. **Validate** - run the ordered hook chain and collect coded findings
//!    ([`validation`]). Program rule effects are attached before this stage
//!    ([`rules`]).
//! 5. **Commit** - write the bundle inside one transaction under the chosen
//!    atomic and flush modes ([`bundle`]).
//!
//! # Features
//!
//! - `sqlite` (default) - the SQLite store, with in-memory and file modes
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dhis_tracker::{
//!     InMemoryTrackerStore, TrackerImportParams, TrackerImportService, TrackerPayload, User,
//! };
//! use dhis_tracker::store::TrackerStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryTrackerStore::new());
//! store.save_user(User::new("M5zQapPyTZI", "admin").with_authority("ALL")).await?;
//!
//! let payload = TrackerPayload::from_json(r#"{"trackedEntities": []}"#)?;
//! let service = TrackerImportService::new(store);
//! let report = service
//!     .import(TrackerImportParams::new("admin", payload))
//!     .await?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! # Ok(())
//! # }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

pub mod bundle;
pub mod converter;
pub mod domain;
pub mod error;
pub mod identifier;
pub mod model;
pub mod normalize;
pub mod options;
pub mod preheat;
pub mod rules;
pub mod store;
pub mod user;
pub mod validation;

// Re-export commonly used types at crate root
pub use bundle::{
    TrackerBundle, TrackerBundleReport, TrackerImportReport, TrackerImportService, TrackerStats,
    TrackerStatus,
};
pub use domain::{Enrollment, Event, Relationship, TrackedEntity, TrackerPayload, TrackerType};
pub use error::{StorageError, StorageResult, TrackerError, TrackerResult};
pub use identifier::{TrackerIdScheme, TrackerIdentifierParams};
pub use options::{
    AtomicMode, FlushMode, TrackerImportMode, TrackerImportOptions, TrackerImportParams,
    TrackerImportStrategy, TrackerReportMode, ValidationMode,
};
pub use preheat::{PreheatConfig, TrackerPreheat, TrackerPreheatService};
pub use rules::{NoopRuleEngine, RuleEngine};
pub use store::{InMemoryTrackerStore, TrackerStore};
#[cfg(feature = "sqlite")]
pub use store::{SqliteStoreConfig, SqliteTrackerStore};
pub use user::User;
pub use validation::{TrackerErrorCode, TrackerValidationReport, TrackerValidationService};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
