//! Error types for the execution engine

use std::fmt;

use thiserror::Error;

use crate::driver::DriverError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Common(#[from] retrace_common::Error),

    #[error("Browser launch failed: {0}")]
    Launch(DriverError),

    #[error("Browser error: {0}")]
    Driver(DriverError),

    #[error(transparent)]
    Recorder(#[from] RecorderError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for EngineError {
    fn from(err: toml::ser::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Lifecycle state of a recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderState::Idle => f.write_str("idle"),
            RecorderState::Recording => f.write_str("recording"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecorderError {
    #[error("Invalid state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: RecorderState,
    },
}

/// Failures talking to a hosted language model
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed model reply: {0}")]
    MalformedReply(String),
}
