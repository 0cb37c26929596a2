//! Error types for the workflow harness.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type for harness operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The model rejected an action because its guard was not met.
    #[error("guard violation on {action}: {message}")]
    GuardViolation { action: String, message: String },

    /// The action is not permitted from the current state or by this actor.
    #[error("illegal transition: cannot {action} from {from} as {actor}")]
    IllegalTransition {
        action: String,
        from: String,
        actor: String,
    },

    /// An expected condition did not become visible within its bound.
    #[error("timed out after {after:?} waiting for {what}")]
    ObservationTimeout { what: String, after: Duration },

    /// The system under test diverged from documented behavior.
    ///
    /// The payload is the rendered bug report.
    #[error("discovered defect:\n{0}")]
    DiscoveredDefect(String),

    /// A test case or scenario document is missing required data.
    #[error("malformed fixture {case}: {reason}")]
    MalformedFixture { case: String, reason: String },

    /// The page driver failed to perform an action.
    #[error("driver error: {0}")]
    Driver(String),

    /// The page has no entity of that kind and name.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    /// Login, logout or actor switching failed.
    #[error("session error: {0}")]
    Session(String),

    /// Harness configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A fixture or scenario file could not be parsed.
    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// IO error while reading fixtures or writing artifacts.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A report could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn driver(msg: impl Into<String>) -> Self {
        Error::Driver(msg.into())
    }
}

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;
