//! Error types for Retrace

use thiserror::Error;

/// Result type alias using the Retrace error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the script model, the stores and the enrichment feeders
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    #[error("Invalid {kind} at {path}: {reason}")]
    Invalid {
        kind: String,
        path: String,
        reason: String,
    },

    #[error("Invalid script name '{0}': nothing left to use as a file name")]
    InvalidName(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub fn script_not_found(name: impl Into<String>) -> Self {
        Error::NotFound {
            kind: "Script".to_string(),
            name: name.into(),
        }
    }

    /// Whether this error means the requested item does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// An Action that does not satisfy the per-kind presence rules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{kind} action requires a selector")]
    MissingSelector { kind: String },

    #[error("{kind} action requires a value ({what})")]
    MissingValue { kind: String, what: &'static str },

    #[error("{kind} action requires expected text")]
    MissingText { kind: String },

    #[error("timeout must be a positive number of milliseconds, got {0}")]
    InvalidTimeout(u64),

    #[error("unknown wait mode '{0}' (expected load, domcontentloaded, networkidle or milliseconds)")]
    InvalidWaitMode(String),
}
