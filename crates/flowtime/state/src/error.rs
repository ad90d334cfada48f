//! Error types for flowtime-state.
//!
//! Structural and loading failures abort the request with a
//! [`StateQueryError`]; data-quality issues never surface here, they become
//! warnings on the response instead.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by state and window queries.
///
/// Every variant maps to a stable HTTP-style status via [`status_code`].
///
/// [`status_code`]: StateQueryError::status_code
#[derive(Debug, Error)]
pub enum StateQueryError {
    /// Bad bin range or malformed identifier.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Run, model, or manifest does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Data conflict such as a provenance hash mismatch or unparseable model.
    #[error("conflict: {message}")]
    Conflict {
        message: String,
        code: Option<String>,
    },

    /// The model has no topology.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Requested window exceeds the configured maximum.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Mode validation rejected the run.
    #[error("unprocessable: {message}")]
    UnprocessableEntity { message: String, code: String },

    /// Unexpected I/O or logic failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StateQueryError {
    pub fn conflict(message: impl Into<String>) -> Self {
        StateQueryError::Conflict {
            message: message.into(),
            code: None,
        }
    }

    pub fn conflict_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        StateQueryError::Conflict {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// HTTP-style status for transport mapping.
    pub fn status_code(&self) -> u16 {
        match self {
            StateQueryError::InvalidRequest(_) => 400,
            StateQueryError::NotFound(_) => 404,
            StateQueryError::Conflict { .. } => 409,
            StateQueryError::PreconditionFailed(_) => 412,
            StateQueryError::PayloadTooLarge(_) => 413,
            StateQueryError::UnprocessableEntity { .. } => 422,
            StateQueryError::Internal(_) => 500,
        }
    }

    /// Machine-readable code, when one applies.
    pub fn code(&self) -> Option<&str> {
        match self {
            StateQueryError::Conflict { code, .. } => code.as_deref(),
            StateQueryError::UnprocessableEntity { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Errors raised by run artifact collaborators (readers and loaders).
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Artifact file is missing.
    #[error("artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Artifact exists but lacks required fields.
    #[error("incomplete artifact {}: {reason}", path.display())]
    Incomplete { path: PathBuf, reason: String },

    /// Artifact content could not be decoded.
    #[error("malformed artifact {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    /// Model text could not be parsed.
    #[error("model parse error: {0}")]
    Parse(String),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArtifactError {
    /// Map a `tokio::fs`/`std::fs` failure, keeping not-found distinct.
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::NotFound(path.into())
        } else {
            ArtifactError::Io(err)
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            ArtifactError::NotFound(_) => true,
            ArtifactError::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for state queries.
pub type StateResult<T> = Result<T, StateQueryError>;

/// Result type for artifact collaborators.
pub type ArtifactResult<T> = Result<T, ArtifactError>;
