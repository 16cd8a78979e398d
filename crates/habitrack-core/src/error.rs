//! Core error types for habitrack-core.
//!
//! Every manager operation reports failures through [`CoreError`]. Nothing
//! crosses a manager boundary as a panic; callers get a value back and decide
//! whether to re-invoke.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for habitrack-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A mutating call was made without a user id.
    #[error("User not authenticated")]
    NotAuthenticated,

    /// The backing store (or auth provider) call failed.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// A payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Local cache failures that could not be treated as a miss.
    #[error("Cache error: {0}")]
    Cache(String),

    /// The OS credential store could not be read or written.
    #[error("Credential store error: {0}")]
    Credentials(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CoreError {
    /// Generic message safe to show to a user. The detail belongs in the log.
    pub fn user_message(&self) -> &'static str {
        match self {
            CoreError::NotAuthenticated => "You must be signed in to do that.",
            CoreError::Validation(_) => "Please check the values you entered.",
            CoreError::Remote(_) => "Could not reach the server. Please try again.",
            _ => "Something went wrong. Please try again.",
        }
    }
}

/// Errors raised by the remote store and auth backends.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Transport-level failure.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A row expected to exist was not returned.
    #[error("No row in '{table}' matched id '{id}'")]
    NotFound { table: String, id: String },

    /// The backend is unreachable or refused the call for another reason.
    #[error("{0}")]
    Unavailable(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was empty.
    #[error("'{0}' must not be empty")]
    Empty(String),

    /// A text field exceeded its maximum length.
    #[error("'{field}' exceeds {max} characters")]
    TooLong { field: String, max: usize },

    /// Reminder time not in HH:MM 24-hour form.
    #[error("Invalid reminder time '{0}', expected HH:MM")]
    InvalidTime(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Cache(err.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::Remote(RemoteError::Network(err))
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_authenticated_has_stable_message() {
        assert_eq!(CoreError::NotAuthenticated.to_string(), "User not authenticated");
    }

    #[test]
    fn user_message_hides_remote_detail() {
        let err = CoreError::Remote(RemoteError::Status {
            status: 500,
            message: "relation \"habits\" does not exist".into(),
        });
        assert!(!err.user_message().contains("relation"));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn validation_converts_into_core_error() {
        let err: CoreError = ValidationError::Empty("title".into()).into();
        assert!(matches!(err, CoreError::Validation(ValidationError::Empty(_))));
    }
}
