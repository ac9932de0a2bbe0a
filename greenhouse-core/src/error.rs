//! Error types for Greenhouse operations

use std::time::Duration;
use thiserror::Error;

/// Remote catalogue service errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote endpoint {endpoint} unavailable: {reason}")]
    Unavailable { endpoint: String, reason: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Request to {endpoint} timed out after {after:?}")]
    Timeout { endpoint: String, after: Duration },
}

/// Local plant store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Insert failed: {reason}")]
    InsertFailed { reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Store closed")]
    Closed,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Greenhouse errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GreenhouseError {
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Greenhouse operations.
pub type GreenhouseResult<T> = Result<T, GreenhouseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::Unavailable {
            endpoint: "custom_plant_sort_order".to_string(),
            reason: "connection refused".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("custom_plant_sort_order"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_store_error_converts_into_master() {
        let err: GreenhouseError = StoreError::Closed.into();
        assert_eq!(err, GreenhouseError::Store(StoreError::Closed));
        assert_eq!(format!("{}", err), "Store error: Store closed");
    }

    #[test]
    fn test_timeout_display_includes_duration() {
        let err = RemoteError::Timeout {
            endpoint: "plants".to_string(),
            after: Duration::from_millis(250),
        };
        assert!(format!("{}", err).contains("250ms"));
    }
}
