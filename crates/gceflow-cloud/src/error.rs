//! Compute platform error types

use crate::resource::ResourceKind;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Machine-readable error code reported by the platform
///
/// Retry and idempotence decisions are keyed off these codes, never off the
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NotFound,
    AlreadyExists,
    /// Stale fingerprint or failed precondition
    ConditionNotMet,
    ResourceInUse,
    QuotaExceeded,
    Other(String),
}

impl ErrorCode {
    /// Parse either a REST error reason (`alreadyExists`) or an operation
    /// error code (`RESOURCE_ALREADY_EXISTS`)
    pub fn parse(code: &str) -> Self {
        match code {
            "NOT_FOUND" | "RESOURCE_NOT_FOUND" | "notFound" => ErrorCode::NotFound,
            "ALREADY_EXISTS" | "RESOURCE_ALREADY_EXISTS" | "alreadyExists" => {
                ErrorCode::AlreadyExists
            }
            "CONDITION_NOT_MET" | "conditionNotMet" => ErrorCode::ConditionNotMet,
            "RESOURCE_IN_USE"
            | "RESOURCE_IN_USE_BY_ANOTHER_RESOURCE"
            | "resourceInUseByAnotherResource" => ErrorCode::ResourceInUse,
            "QUOTA_EXCEEDED" | "quotaExceeded" => ErrorCode::QuotaExceeded,
            other => ErrorCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::ConditionNotMet => "CONDITION_NOT_MET",
            ErrorCode::ResourceInUse => "RESOURCE_IN_USE",
            ErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorCode::Other(code) => code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cloud orchestration errors
#[derive(Error, Debug)]
pub enum CloudError {
    /// Network-level failure talking to the platform; retryable
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Transport failed after {attempts} attempts: {message}")]
    TransportFailure { attempts: u32, message: String },

    /// Request rejected synchronously by the platform
    #[error("API error [{code}]: {message}")]
    Api { code: ErrorCode, message: String },

    /// Operation reached DONE carrying an error list
    #[error("Operation {operation} failed [{code}]: {message}")]
    OperationFailed {
        operation: String,
        code: ErrorCode,
        message: String,
    },

    #[error("Timeout: operation {operation} not done after {waited:?}")]
    Timeout { operation: String, waited: Duration },

    /// Operation record no longer exists on the platform
    #[error("Operation lost: {0}")]
    Lost(String),

    #[error("Conflict on {resource}: {message}")]
    Conflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Unexpected resource: expected {expected}, got {actual}")]
    UnexpectedResource {
        expected: ResourceKind,
        actual: ResourceKind,
    },

    #[error("Invalid node id: {0} (expected <zone>/<name>)")]
    InvalidNodeId(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    pub fn api(code: ErrorCode, message: impl Into<String>) -> Self {
        CloudError::Api {
            code,
            message: message.into(),
        }
    }

    /// Platform error code, if the error carries one
    pub fn code(&self) -> Option<&ErrorCode> {
        match self {
            CloudError::Api { code, .. } | CloudError::OperationFailed { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::ResourceNotFound(_))
            || self.code() == Some(&ErrorCode::NotFound)
    }

    pub fn is_already_exists(&self) -> bool {
        self.code() == Some(&ErrorCode::AlreadyExists)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CloudError::Conflict { .. })
            || self.code() == Some(&ErrorCode::ConditionNotMet)
    }

    pub fn is_in_use(&self) -> bool {
        self.code() == Some(&ErrorCode::ResourceInUse)
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, CloudError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_codes() {
        assert_eq!(ErrorCode::parse("alreadyExists"), ErrorCode::AlreadyExists);
        assert_eq!(
            ErrorCode::parse("RESOURCE_ALREADY_EXISTS"),
            ErrorCode::AlreadyExists
        );
        assert_eq!(ErrorCode::parse("notFound"), ErrorCode::NotFound);
        assert_eq!(
            ErrorCode::parse("RESOURCE_IN_USE_BY_ANOTHER_RESOURCE"),
            ErrorCode::ResourceInUse
        );
        assert_eq!(
            ErrorCode::parse("ZONE_RESOURCE_POOL_EXHAUSTED"),
            ErrorCode::Other("ZONE_RESOURCE_POOL_EXHAUSTED".to_string())
        );
    }

    #[test]
    fn test_classification_uses_codes_not_messages() {
        let err = CloudError::api(ErrorCode::Other("X".into()), "resource already exists");
        assert!(!err.is_already_exists());

        let err = CloudError::OperationFailed {
            operation: "operation-1".into(),
            code: ErrorCode::AlreadyExists,
            message: "boom".into(),
        };
        assert!(err.is_already_exists());
        assert!(!err.is_transient());

        assert!(CloudError::ResourceNotFound("disk".into()).is_not_found());
        assert!(CloudError::Transport("reset".into()).is_transient());
        assert!(CloudError::api(ErrorCode::ConditionNotMet, "stale").is_conflict());
    }
}
