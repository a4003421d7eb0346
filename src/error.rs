//! Error types for taskdeck
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (invalid input, unknown task, bad config)
//! - 4: Operation failed (storage unreachable or corrupt, unexpected failure)

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Exit codes for the taskdeck CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for taskdeck operations
#[derive(Error, Debug)]
pub enum Error {
    // Task-level failures surfaced by the synchronizer and the stores
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Duplicate task id: {0}")]
    DuplicateId(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Storage corrupt: {0}")]
    StorageCorrupt(String),

    #[error("Unexpected failure: {0}")]
    Unknown(String),

    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),
}

impl Error {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Error::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation { .. }
            | Error::NotFound(_)
            | Error::DuplicateId(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_) => exit_codes::USER_ERROR,

            Error::StorageUnavailable(_)
            | Error::StorageCorrupt(_)
            | Error::Unknown(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::LockFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Stable snake_case tag for machine-readable output
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "validation",
            Error::NotFound(_) => "not_found",
            Error::DuplicateId(_) => "duplicate_id",
            Error::StorageUnavailable(_) | Error::Io(_) | Error::LockFailed(_) => {
                "storage_unavailable"
            }
            Error::StorageCorrupt(_) | Error::Json(_) => "storage_corrupt",
            Error::Unknown(_) => "unknown",
            Error::InvalidConfig(_) | Error::TomlParse(_) => "invalid_config",
            Error::InvalidArgument(_) => "invalid_argument",
        }
    }

    /// Whether the error originated before any storage access.
    pub fn is_local(&self) -> bool {
        matches!(self, Error::Validation { .. } | Error::InvalidArgument(_))
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::Validation { field, reason } => Some(serde_json::json!({
                "field": field,
                "reason": reason,
            })),
            Error::NotFound(id) | Error::DuplicateId(id) => {
                Some(serde_json::json!({ "id": id }))
            }
            Error::LockFailed(path) => Some(serde_json::json!({
                "path": path.display().to_string(),
            })),
            _ => None,
        }
    }
}

/// Result type alias for taskdeck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Snapshot of the most recent surfaced error, kept for a presentation
/// layer to show as a dismissable notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorNotice {
    pub kind: &'static str,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl From<&Error> for ErrorNotice {
    fn from(err: &Error) -> Self {
        ErrorNotice {
            kind: err.kind(),
            message: err.to_string(),
            at: Utc::now(),
        }
    }
}
