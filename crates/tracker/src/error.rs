//! Error types for the tracker import pipeline.
//!
//! Content-level problems in a payload (unknown references, bad values,
//! missing mandatory attributes) are never errors: they are reported as
//! [`TrackerErrorReport`](crate::validation::TrackerErrorReport) data. The
//! types in this module cover everything else, organised in the same
//! hierarchy the pipeline stages follow: payload, preheat, storage and commit.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

use crate::domain::TrackerType;

/// The primary error type for a tracker import.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// The payload document could not be read or normalized.
    #[error(transparent)]
    Payload(#[from] PayloadError),

    /// The preheat stage failed.
    #[error(transparent)]
    Preheat(#[from] PreheatError),

    /// The underlying store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The commit stage could not complete.
    #[error(transparent)]
    Commit(#[from] CommitError),
}

/// Errors raised while reading or flattening a payload.
#[derive(Error, Debug)]
pub enum PayloadError {
    /// A top-level collection is present but is not a JSON array.
    #[error("property '{property}' is not an array")]
    NotAnArray { property: String },

    /// The payload document is not valid JSON for the tracker model.
    #[error("malformed payload: {message}")]
    Malformed { message: String },

    /// An object is still missing its identifier after normalization.
    #[error("{tracker_type} at position {index} has no identifier after normalization")]
    MissingIdentifier {
        tracker_type: TrackerType,
        index: usize,
    },
}

/// Errors raised by the preheat stage.
#[derive(Error, Debug)]
pub enum PreheatError {
    /// The import parameters do not name a user, or the user does not exist.
    #[error("tracker preheat is missing the user object: {user}")]
    MissingUser { user: String },

    /// A supplier failed while fail-fast preheating is enabled.
    #[error("preheat supplier '{supplier}' failed: {message}")]
    SupplierFailed { supplier: String, message: String },
}

/// Errors raised when committing a bundle.
#[derive(Error, Debug)]
pub enum CommitError {
    /// The bundle was rolled back because an object could not be persisted.
    #[error("commit rolled back at {tracker_type} '{uid}': {reason}")]
    RolledBack {
        tracker_type: TrackerType,
        uid: String,
        reason: String,
    },

    /// The transaction was used after commit or rollback.
    #[error("transaction no longer valid")]
    InvalidTransaction,
}

/// Errors originating from a tracker store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// An object with the same identifier already exists.
    #[error("{tracker_type} already exists: {uid}")]
    AlreadyExists {
        tracker_type: TrackerType,
        uid: String,
    },

    /// The object to update or delete does not exist.
    #[error("{tracker_type} not found: {uid}")]
    NotFound {
        tracker_type: TrackerType,
        uid: String,
    },

    /// Backend specific failure.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Result type alias for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Result type alias for store operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

impl From<serde_json::Error> for PayloadError {
    fn from(err: serde_json::Error) -> Self {
        PayloadError::Malformed {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Payload(err.into())
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(_err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_error_display() {
        let err = PayloadError::NotAnArray {
            property: "events".to_string(),
        };
        assert_eq!(err.to_string(), "property 'events' is not an array");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::AlreadyExists {
            tracker_type: TrackerType::Event,
            uid: "ZwwuwNp6gVd".to_string(),
        };
        assert_eq!(err.to_string(), "event already exists: ZwwuwNp6gVd");
    }

    #[test]
    fn test_tracker_error_from_preheat() {
        let err: TrackerError = PreheatError::MissingUser {
            user: "M5zQapPyTZI".to_string(),
        }
        .into();
        assert!(matches!(err, TrackerError::Preheat(_)));
        assert!(err.to_string().contains("missing the user"));
    }

    #[test]
    fn test_commit_error_display() {
        let err = CommitError::RolledBack {
            tracker_type: TrackerType::Enrollment,
            uid: "MNWZ6hnuhSw".to_string(),
            reason: "constraint failed".to_string(),
        };
        assert!(err.to_string().contains("enrollment 'MNWZ6hnuhSw'"));
    }
}
