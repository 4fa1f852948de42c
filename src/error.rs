use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Client related errors
    InvalidHost,

    // Event related errors
    UnknownEvent,
    EventBusPublishFailed,
    RelayStopped,

    // Configuration related errors
    ConfigInvalid,
    ConfigIo,
    ConfigParse,
}

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Warnings that might impact functionality but don't stop operation
    Warning,
    /// Errors that impact functionality but allow continued operation
    Error,
    /// Errors that prevent the relay from functioning
    Critical,
}

/// Relay error types
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid host identifier '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("Unknown event name '{name}'")]
    UnknownEvent { name: String },

    #[error("Failed to publish event to event bus: {reason}")]
    PublishFailed { reason: String },

    #[error("Relay for '{host}' is not running")]
    RelayStopped { host: String },

    #[error("Invalid configuration value for '{key}': {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("Failed to access configuration file: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl RelayError {
    /// Error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidHost { .. } => ErrorCode::InvalidHost,
            Self::UnknownEvent { .. } => ErrorCode::UnknownEvent,
            Self::PublishFailed { .. } => ErrorCode::EventBusPublishFailed,
            Self::RelayStopped { .. } => ErrorCode::RelayStopped,
            Self::ConfigInvalid { .. } => ErrorCode::ConfigInvalid,
            Self::ConfigIo(_) => ErrorCode::ConfigIo,
            Self::ConfigParse(_) => ErrorCode::ConfigParse,
        }
    }

    /// Severity of this error
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnknownEvent { .. } | Self::RelayStopped { .. } => ErrorSeverity::Warning,
            Self::InvalidHost { .. } | Self::PublishFailed { .. } => ErrorSeverity::Error,
            Self::ConfigInvalid { .. } | Self::ConfigIo(_) | Self::ConfigParse(_) => {
                ErrorSeverity::Critical
            }
        }
    }
}

pub type RelayResult<T> = Result<T, RelayError>;

// Utility functions to create errors

/// Create an invalid host error
pub fn invalid_host(host: impl Into<String>, reason: impl Into<String>) -> RelayError {
    RelayError::InvalidHost {
        host: host.into(),
        reason: reason.into(),
    }
}

/// Create an unknown event error
pub fn unknown_event(name: impl Into<String>) -> RelayError {
    RelayError::UnknownEvent { name: name.into() }
}

/// Create an event bus publish failed error
pub fn event_bus_publish_failed(reason: impl std::fmt::Display) -> RelayError {
    RelayError::PublishFailed {
        reason: reason.to_string(),
    }
}

/// Create a relay stopped error
pub fn relay_stopped(host: impl Into<String>) -> RelayError {
    RelayError::RelayStopped { host: host.into() }
}

/// Create a configuration invalid error
pub fn config_invalid(key: impl Into<String>, reason: impl Into<String>) -> RelayError {
    RelayError::ConfigInvalid {
        key: key.into(),
        reason: reason.into(),
    }
}
