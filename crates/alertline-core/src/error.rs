//! Error types shared across the workspace.

use thiserror::Error;

/// Result type for alertline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while ingesting, storing and dispatching reports.
#[derive(Debug, Error)]
pub enum Error {
    /// Client supplied an invalid report (bad severity, missing app).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Report, group or user not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage operation failed.
    #[error("Storage failed: {0}")]
    Storage(String),

    /// One or more notifiers failed to deliver.
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    /// A recovery report could not resolve its group.
    #[error("Auto-resolve failed: {0}")]
    AutoResolve(String),

    /// The acting user could not be determined.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Other error.
    #[error("Other: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Stable machine readable code, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Storage(_) => "STORAGE_ERROR",
            Error::Dispatch(_) => "DISPATCH_ERROR",
            Error::AutoResolve(_) => "AUTO_RESOLVE_ERROR",
            Error::Unauthenticated(_) => "UNAUTHORIZED",
            Error::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            Error::Other(_) => "INTERNAL_ERROR",
        }
    }
}
