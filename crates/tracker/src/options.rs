//! Import configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::TrackerPayload;
use crate::identifier::TrackerIdentifierParams;

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Name used on the wire.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let upper = s.trim().to_uppercase().replace('-', "_");
                match upper.as_str() {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(format!("invalid {}: {}", stringify!($name), s)),
                }
            }
        }
    };
}

wire_enum! {
    /// Whether the import is committed or only validated.
    pub enum TrackerImportMode {
        #[default]
        Commit => "COMMIT",
        Validate => "VALIDATE",
    }
}

wire_enum! {
    /// What the import does with each object.
    pub enum TrackerImportStrategy {
        Create => "CREATE",
        Update => "UPDATE",
        #[default]
        CreateAndUpdate => "CREATE_AND_UPDATE",
        Delete => "DELETE",
        /// Create or update, deleting objects flagged `deleted`.
        Sync => "SYNC",
    }
}

impl TrackerImportStrategy {
    pub fn is_create(&self) -> bool {
        *self == TrackerImportStrategy::Create
    }

    pub fn is_update(&self) -> bool {
        *self == TrackerImportStrategy::Update
    }

    pub fn is_delete(&self) -> bool {
        *self == TrackerImportStrategy::Delete
    }

    /// Returns `true` for strategies that both create and update.
    pub fn is_create_and_update(&self) -> bool {
        matches!(
            self,
            TrackerImportStrategy::CreateAndUpdate | TrackerImportStrategy::Sync
        )
    }
}

wire_enum! {
    /// Failure isolation at commit time.
    pub enum AtomicMode {
        /// Any failure rolls back the whole bundle.
        #[default]
        All => "ALL",
        /// Failed objects are skipped, the rest commits.
        Object => "OBJECT",
    }
}

wire_enum! {
    /// Write flush granularity.
    pub enum FlushMode {
        /// Flush once per tracker type.
        #[default]
        Auto => "AUTO",
        /// Flush after every object.
        Object => "OBJECT",
    }
}

wire_enum! {
    /// Validation strictness.
    pub enum ValidationMode {
        #[default]
        Full => "FULL",
        /// Stop at the first error of each object.
        FailFast => "FAIL_FAST",
        /// Bypass validation. Invalid data can end up persisted.
        Skip => "SKIP",
    }
}

wire_enum! {
    /// How much of the validation report is returned.
    pub enum TrackerReportMode {
        #[default]
        Errors => "ERRORS",
        Warnings => "WARNINGS",
        Full => "FULL",
    }
}

/// Options of one import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerImportOptions {
    pub import_mode: TrackerImportMode,
    pub import_strategy: TrackerImportStrategy,
    pub atomic_mode: AtomicMode,
    pub flush_mode: FlushMode,
    pub validation_mode: ValidationMode,
    pub identifiers: TrackerIdentifierParams,
    pub skip_text_pattern_validation: bool,
    pub skip_side_effects: bool,
    pub skip_rule_engine: bool,
    pub report_mode: TrackerReportMode,
}

/// Everything an import needs: who runs it, how, and what.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerImportParams {
    /// UID or username of the acting user.
    pub user_id: String,
    #[serde(default)]
    pub options: TrackerImportOptions,
    #[serde(default)]
    pub payload: TrackerPayload,
}

impl TrackerImportParams {
    pub fn new(user_id: impl Into<String>, payload: TrackerPayload) -> Self {
        Self {
            user_id: user_id.into(),
            options: TrackerImportOptions::default(),
            payload,
        }
    }

    pub fn with_options(mut self, options: TrackerImportOptions) -> Self {
        self.options = options;
        self
    }
}
