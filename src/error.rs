//! Error taxonomy shared by the ledger, the context engine and the
//! generation backends.

use serde::Serialize;
use thiserror::Error;

/// Result alias used by library modules.
pub type Result<T> = std::result::Result<T, LensError>;

/// Errors surfaced to callers of commit-lens operations.
///
/// Every variant carries a human-readable detail string so callers never
/// have to report an error without explanation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LensError {
    /// Repository, commit or SHA unknown to GitHub (or not visible to the token).
    #[error("{0}")]
    NotFound(String),

    /// Authentication, permission or rate-limit rejection from GitHub.
    #[error("{0}")]
    Forbidden(String),

    /// Network or upstream availability failure; retrying may succeed.
    #[error("{0}")]
    Transient(String),

    /// The generation backend refused to answer on policy grounds.
    #[error("The AI backend blocked the response due to: {reason}")]
    GenerationBlocked {
        /// Block reason reported by the backend.
        reason: String,
    },

    /// The generation backend produced no usable text.
    #[error("The AI backend returned no usable output: {0}")]
    GenerationEmpty(String),

    /// Input rejected before calling the generation backend.
    #[error("Input too large: {detail} ({size} > {limit})")]
    OversizeInput {
        /// What was too large.
        detail: String,
        /// Measured size.
        size: usize,
        /// Applicable limit.
        limit: usize,
    },

    /// Malformed or incomplete request from the caller.
    #[error("Invalid request: {0}")]
    InvalidInput(String),

    /// Internal invariant violation.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`LensError::NotFound`].
    NotFound,
    /// See [`LensError::Forbidden`].
    Forbidden,
    /// See [`LensError::Transient`].
    Transient,
    /// See [`LensError::GenerationBlocked`].
    GenerationBlocked,
    /// See [`LensError::GenerationEmpty`].
    GenerationEmpty,
    /// See [`LensError::OversizeInput`].
    OversizeInput,
    /// See [`LensError::InvalidInput`].
    InvalidInput,
    /// See [`LensError::Internal`].
    Internal,
}

impl ErrorKind {
    /// Returns the snake_case label used in CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::Transient => "transient",
            Self::GenerationBlocked => "generation_blocked",
            Self::GenerationEmpty => "generation_empty",
            Self::OversizeInput => "oversize_input",
            Self::InvalidInput => "invalid_input",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured `{kind, message}` pair for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    /// Error kind.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl LensError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Transient(_) => ErrorKind::Transient,
            Self::GenerationBlocked { .. } => ErrorKind::GenerationBlocked,
            Self::GenerationEmpty(_) => ErrorKind::GenerationEmpty,
            Self::OversizeInput { .. } => ErrorKind::OversizeInput,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::GenerationEmpty(_))
    }

    /// Builds the structured report for this error.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<reqwest::Error> for LensError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transient(format!("Request timed out: {err}"))
        } else if err.is_decode() {
            Self::Internal(format!("Unexpected response body: {err}"))
        } else {
            Self::Transient(format!("Network error: {err}"))
        }
    }
}
