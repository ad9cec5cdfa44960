//! Error types for the Unit controller.
//!
//! This module provides the error hierarchy for every stage of a reconcile
//! pass: configuration, object-store access, planning and reconciliation.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Unit controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Object store errors.
    #[error("Object store error: {0}")]
    Store(#[from] StoreError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },
}

/// Object store errors.
///
/// `NotFound` is only produced by writes; reads report absence as `Ok(None)`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The object does not exist.
    #[error("{kind} {key} not found")]
    NotFound {
        /// Object kind.
        kind: String,
        /// Namespaced name of the object.
        key: String,
    },

    /// An object with the same identity already exists.
    #[error("{kind} {key} already exists")]
    AlreadyExists {
        /// Object kind.
        kind: String,
        /// Namespaced name of the object.
        key: String,
    },

    /// The write carried a stale resource version.
    #[error("Conflict writing {kind} {key}: {message}")]
    Conflict {
        /// Object kind.
        kind: String,
        /// Namespaced name of the object.
        key: String,
        /// Server-provided detail.
        message: String,
    },

    /// Authentication or authorization failed.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of the failure.
        message: String,
    },

    /// The server asked the client to slow down.
    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// The server rejected the request.
    #[error("API request failed: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the server.
        message: String,
    },

    /// Transport failure.
    #[error("Network error: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// A stored object could not be decoded into its schema.
    #[error("Failed to decode {kind}: {message}")]
    Decode {
        /// Object kind.
        kind: String,
        /// Description of the decode failure.
        message: String,
    },

    /// An object could not be encoded for writing.
    #[error("Failed to encode {kind}: {message}")]
    Encode {
        /// Object kind.
        kind: String,
        /// Description of the encode failure.
        message: String,
    },
}

/// Planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The Unit lacks an identity field required to own children.
    #[error("Unit {key} has no {field}; cannot build owner reference")]
    MissingIdentity {
        /// Namespaced name of the Unit.
        key: String,
        /// Missing metadata field.
        field: &'static str,
    },

    /// The planned spec could not be hashed.
    #[error("Failed to hash {kind} spec: {message}")]
    Hash {
        /// Child kind.
        kind: &'static str,
        /// Description of the failure.
        message: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// One or more child operations failed during the pass.
    #[error("Reconcile of Unit {key} failed: {failed} of {total} child operations failed")]
    PassFailed {
        /// Namespaced name of the Unit.
        key: String,
        /// Number of failed operations.
        failed: usize,
        /// Number of attempted operations.
        total: usize,
    },

    /// The status write was rejected.
    #[error("Failed to write status of Unit {key}: {reason}")]
    StatusWriteFailed {
        /// Namespaced name of the Unit.
        key: String,
        /// Reason for the failure.
        reason: String,
    },

    /// The pass panicked and was caught at the worker boundary.
    #[error("Reconcile of Unit {key} panicked: {message}")]
    Panicked {
        /// Namespaced name of the Unit.
        key: String,
        /// Panic payload, when it was a string.
        message: String,
    },
}

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, ControllerError>;

impl ControllerError {
    /// Returns true if a later pass may succeed without any change to the Unit.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::Reconcile(_) | Self::Io(_) => true,
            Self::Config(_) | Self::Plan(_) => false,
        }
    }

    /// Returns the suggested retry delay in seconds, if the error carries one.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Store(StoreError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            Self::Store(StoreError::Conflict { .. }) => Some(1),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl StoreError {
    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Returns true if the fault is expected to clear on its own.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Conflict { .. }
            | Self::AlreadyExists { .. }
            | Self::NotFound { .. }
            | Self::RateLimited { .. }
            | Self::Network { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Unauthorized { .. } | Self::Decode { .. } | Self::Encode { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_retryable_with_short_delay() {
        let err = ControllerError::Store(StoreError::Conflict {
            kind: String::from("Unit"),
            key: String::from("default/web"),
            message: String::from("stale"),
        });

        assert!(err.is_retryable());
        assert_eq!(err.retry_delay_secs(), Some(1));
    }

    #[test]
    fn test_rate_limit_carries_delay() {
        let err = ControllerError::Store(StoreError::RateLimited { retry_after_secs: 7 });
        assert_eq!(err.retry_delay_secs(), Some(7));
    }

    #[test]
    fn test_decode_and_plan_errors_are_fatal() {
        let decode = ControllerError::Store(StoreError::Decode {
            kind: String::from("Unit"),
            message: String::from("invalid type"),
        });
        let plan = ControllerError::Plan(PlanError::MissingIdentity {
            key: String::from("default/web"),
            field: "uid",
        });

        assert!(!decode.is_retryable());
        assert!(!plan.is_retryable());
    }

    #[test]
    fn test_server_errors_split_on_status() {
        assert!(StoreError::api_error(503, "unavailable").is_transient());
        assert!(!StoreError::api_error(422, "invalid").is_transient());
    }
}
