//! Core error types for buytime-core.
//!
//! Each concern gets its own thiserror enum; [`CoreError`] aggregates them
//! for callers (mostly the CLI) that just want to bubble failures up.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for buytime-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote service errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Restriction state machine errors
    #[error("Restriction error: {0}")]
    Restriction(#[from] RestrictionError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Credential storage errors
    #[error("Credential error: {0}")]
    Credential(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key/value store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked by another process
    #[error("Store is locked")]
    Locked,

    /// A stored value could not be decoded
    #[error("Corrupt value for '{key}': {message}")]
    Corrupt { key: String, message: String },
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

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Remote service errors.
///
/// HTTP status codes map onto this taxonomy independently of the response
/// envelope; see [`crate::api::client`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Not authorized. Please sign in again.")]
    Unauthorized,

    #[error("Resource not found.")]
    NotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error. Please try again later.")]
    ServerError,

    #[error("Failed to parse server response: {0}")]
    Decoding(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,
}

/// Coarse classification of an [`ApiError`], cheap to copy into outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    Unauthorized,
    NotFound,
    BadRequest,
    ServerError,
    Decoding,
    Network,
    Timeout,
}

impl ApiError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ApiError::Unauthorized => ApiErrorKind::Unauthorized,
            ApiError::NotFound => ApiErrorKind::NotFound,
            ApiError::BadRequest(_) => ApiErrorKind::BadRequest,
            ApiError::ServerError => ApiErrorKind::ServerError,
            ApiError::Decoding(_) => ApiErrorKind::Decoding,
            ApiError::Network(_) => ApiErrorKind::Network,
            ApiError::Timeout => ApiErrorKind::Timeout,
        }
    }

    /// Transient failures that the next natural trigger may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::ServerError | ApiError::Network(_) | ApiError::Timeout
        )
    }
}

/// Restriction state machine errors.
#[derive(Error, Debug)]
pub enum RestrictionError {
    /// Balance is below the spend unit
    #[error("Insufficient balance: {available} minutes available, {required} required")]
    InsufficientBalance { available: u32, required: u32 },

    /// Spend requested while a monitoring window is already open
    #[error("Restrictions are already lifted until '{activity_id}' ends")]
    AlreadyUnlocked { activity_id: String },

    /// Spend requested while nothing is restricted
    #[error("Nothing is currently restricted")]
    NotRestricted,

    /// Spend amount must be at least one minute
    #[error("Spend amount must be at least one minute")]
    InvalidAmount,

    /// The OS capability rejected a call
    #[error("Platform error: {0}")]
    Platform(#[from] crate::restriction::PlatformError),

    /// Ledger access failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg)
                if inner.code == rusqlite::ErrorCode::DatabaseBusy
                    || inner.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                StoreError::Locked
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decoding(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for ApiError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ApiError::Timeout
    }
}

impl From<keyring::Error> for CoreError {
    fn from(err: keyring::Error) -> Self {
        CoreError::Credential(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors_are_transient_only() {
        assert!(ApiError::ServerError.is_retryable());
        assert!(ApiError::Timeout.is_retryable());
        assert!(ApiError::Network("reset".into()).is_retryable());
        assert!(!ApiError::Unauthorized.is_retryable());
        assert!(!ApiError::NotFound.is_retryable());
        assert!(!ApiError::BadRequest("nope".into()).is_retryable());
    }

    #[test]
    fn insufficient_balance_message() {
        let err = RestrictionError::InsufficientBalance {
            available: 3,
            required: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient balance: 3 minutes available, 5 required"
        );
    }
}
