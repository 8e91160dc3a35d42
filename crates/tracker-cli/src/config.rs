//! Command line configuration for the tracker importer.
//!
//! Every option can also be given through the environment.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TRACKER_DATABASE` | tracker.db | SQLite database file, or `:memory:` |
//! | `TRACKER_LOG_LEVEL` | info | Log level |
//! | `TRACKER_SEED` | | JSON file with metadata and users to save first |
//! | `TRACKER_USER` | | Username or UID of the importing user |
//! | `TRACKER_IMPORT_MODE` | COMMIT | COMMIT or VALIDATE |
//! | `TRACKER_IMPORT_STRATEGY` | CREATE_AND_UPDATE | CREATE, UPDATE, CREATE_AND_UPDATE, DELETE or SYNC |
//! | `TRACKER_ATOMIC_MODE` | ALL | ALL or OBJECT |
//! | `TRACKER_FLUSH_MODE` | AUTO | AUTO or OBJECT |
//! | `TRACKER_VALIDATION_MODE` | FULL | FULL, FAIL_FAST or SKIP |
//! | `TRACKER_REPORT_MODE` | ERRORS | ERRORS, WARNINGS or FULL |
//! | `TRACKER_ID_SCHEME` | UID | UID, CODE, NAME or ATTRIBUTE:<uid> |

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use dhis_tracker::{
    AtomicMode, FlushMode, TrackerIdScheme, TrackerIdentifierParams, TrackerImportMode,
    TrackerImportOptions, TrackerImportStrategy, TrackerReportMode, ValidationMode,
};

/// Configuration of one import run.
#[derive(Debug, Clone, Parser)]
#[command(name = "tracker-import")]
#[command(about = "Import a tracker payload into a SQLite tracker store")]
pub struct ImportConfig {
    /// Tracker payload file (JSON).
    pub payload: PathBuf,

    /// SQLite database file, or `:memory:`.
    #[arg(long, env = "TRACKER_DATABASE", default_value = "tracker.db")]
    pub database: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "TRACKER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Metadata and users to save before importing (JSON).
    #[arg(long, env = "TRACKER_SEED")]
    pub seed: Option<PathBuf>,

    /// Username or UID of the importing user.
    #[arg(short, long, env = "TRACKER_USER")]
    pub user: String,

    #[arg(long, env = "TRACKER_IMPORT_MODE", default_value = "COMMIT")]
    pub import_mode: String,

    #[arg(long, env = "TRACKER_IMPORT_STRATEGY", default_value = "CREATE_AND_UPDATE")]
    pub import_strategy: String,

    #[arg(long, env = "TRACKER_ATOMIC_MODE", default_value = "ALL")]
    pub atomic_mode: String,

    #[arg(long, env = "TRACKER_FLUSH_MODE", default_value = "AUTO")]
    pub flush_mode: String,

    #[arg(long, env = "TRACKER_VALIDATION_MODE", default_value = "FULL")]
    pub validation_mode: String,

    #[arg(long, env = "TRACKER_REPORT_MODE", default_value = "ERRORS")]
    pub report_mode: String,

    /// Identifier scheme of metadata references in the payload.
    #[arg(long, env = "TRACKER_ID_SCHEME", default_value = "UID")]
    pub id_scheme: String,

    /// Do not check generated attribute values against their pattern.
    #[arg(long, env = "TRACKER_SKIP_PATTERN_VALIDATION", default_value = "false")]
    pub skip_pattern_validation: bool,

    /// Do not collect rule side effects.
    #[arg(long, env = "TRACKER_SKIP_SIDE_EFFECTS", default_value = "false")]
    pub skip_side_effects: bool,

    /// Do not run the rule engine.
    #[arg(long, env = "TRACKER_SKIP_RULE_ENGINE", default_value = "false")]
    pub skip_rule_engine: bool,

    /// Pretty-print the report.
    #[arg(long, default_value = "false")]
    pub pretty: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            payload: PathBuf::from("payload.json"),
            database: "tracker.db".to_string(),
            log_level: "info".to_string(),
            seed: None,
            user: String::new(),
            import_mode: "COMMIT".to_string(),
            import_strategy: "CREATE_AND_UPDATE".to_string(),
            atomic_mode: "ALL".to_string(),
            flush_mode: "AUTO".to_string(),
            validation_mode: "FULL".to_string(),
            report_mode: "ERRORS".to_string(),
            id_scheme: "UID".to_string(),
            skip_pattern_validation: false,
            skip_side_effects: false,
            skip_rule_engine: false,
            pretty: false,
        }
    }
}

fn parse<T: FromStr<Err = String> + Default>(value: &str, errors: &mut Vec<String>) -> T {
    value.parse().unwrap_or_else(|e| {
        errors.push(e);
        T::default()
    })
}

impl ImportConfig {
    /// Builds the import options, collecting every invalid value.
    pub fn import_options(&self) -> Result<TrackerImportOptions, Vec<String>> {
        let mut errors = Vec::new();
        let options = TrackerImportOptions {
            import_mode: parse::<TrackerImportMode>(&self.import_mode, &mut errors),
            import_strategy: parse::<TrackerImportStrategy>(&self.import_strategy, &mut errors),
            atomic_mode: parse::<AtomicMode>(&self.atomic_mode, &mut errors),
            flush_mode: parse::<FlushMode>(&self.flush_mode, &mut errors),
            validation_mode: parse::<ValidationMode>(&self.validation_mode, &mut errors),
            report_mode: parse::<TrackerReportMode>(&self.report_mode, &mut errors),
            identifiers: TrackerIdentifierParams {
                id_scheme: parse::<TrackerIdScheme>(&self.id_scheme, &mut errors),
                ..Default::default()
            },
            skip_text_pattern_validation: self.skip_pattern_validation,
            skip_side_effects: self.skip_side_effects,
            skip_rule_engine: self.skip_rule_engine,
        };

        if errors.is_empty() {
            Ok(options)
        } else {
            Err(errors)
        }
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.user.trim().is_empty() {
            errors.push("User cannot be empty".to_string());
        }

        if self.database.trim().is_empty() {
            errors.push("Database cannot be empty".to_string());
        }

        if let Err(option_errors) = self.import_options() {
            errors.extend(option_errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Initializes the tracing subscriber. `RUST_LOG` takes precedence over
/// `level`.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("dhis_tracker={},tracker_import={}", level, level))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
