//! Compute Engine platform error types

use gceflow_cloud::{CloudError, ErrorCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GoogleError {
    #[error("Environment variable not set: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response; `reason` is the first entry of `error.errors[]`
    #[error("API error {status} ({reason}): {message}")]
    Api {
        status: u16,
        reason: String,
        message: String,
    },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GoogleError>;

impl GoogleError {
    /// Rate limiting and server-side failures are worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            GoogleError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            GoogleError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    fn error_code(status: u16, reason: &str) -> ErrorCode {
        match status {
            404 => ErrorCode::NotFound,
            412 => ErrorCode::ConditionNotMet,
            _ if reason.is_empty() => ErrorCode::Other(status.to_string()),
            _ => ErrorCode::parse(reason),
        }
    }
}

impl From<GoogleError> for CloudError {
    fn from(err: GoogleError) -> Self {
        if err.is_transient() {
            return CloudError::Transport(err.to_string());
        }
        match err {
            GoogleError::Api {
                status,
                reason,
                message,
            } => CloudError::api(GoogleError::error_code(status, &reason), message),
            GoogleError::Json(e) => CloudError::Json(e),
            GoogleError::MissingEnvVar(_) | GoogleError::InvalidConfig(_) => {
                CloudError::InvalidConfig(err.to_string())
            }
            GoogleError::Http(e) => CloudError::api(ErrorCode::Other("http".to_string()), e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, reason: &str) -> CloudError {
        GoogleError::Api {
            status,
            reason: reason.to_string(),
            message: "message".to_string(),
        }
        .into()
    }

    #[test]
    fn test_status_mapping() {
        assert!(api(404, "notFound").is_not_found());
        assert!(api(409, "alreadyExists").is_already_exists());
        assert!(api(412, "conditionNotMet").is_conflict());
        assert!(api(400, "resourceInUseByAnotherResource").is_in_use());
        assert!(matches!(api(503, "backendError"), CloudError::Transport(_)));
        assert!(matches!(api(429, "rateLimitExceeded"), CloudError::Transport(_)));
        assert_eq!(
            api(403, "").code(),
            Some(&ErrorCode::Other("403".to_string()))
        );
    }

    #[test]
    fn test_config_errors() {
        let err: CloudError = GoogleError::MissingEnvVar("GCEFLOW_PROJECT".into()).into();
        assert!(matches!(err, CloudError::InvalidConfig(msg) if msg.contains("GCEFLOW_PROJECT")));
    }
}
