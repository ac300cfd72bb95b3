//! Error types for the notifier system.

use thiserror::Error;

/// Result type for notifier operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or using notifiers.
#[derive(Debug, Error)]
pub enum Error {
    /// Notifier not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Notifier is disabled.
    #[error("Notifier disabled: {0}")]
    Disabled(String),

    /// Send operation failed.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Other error.
    #[error("Other: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<Error> for alertline_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(msg) => alertline_core::Error::NotFound(msg),
            Error::InvalidConfiguration(msg) => alertline_core::Error::InvalidConfiguration(msg),
            Error::Other(e) => alertline_core::Error::Other(e),
            other => alertline_core::Error::Dispatch(other.to_string()),
        }
    }
}
