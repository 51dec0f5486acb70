//! Error types for Google Drive provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// Authentication failed or token is invalid
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimitExceeded { retry_after_seconds: u64 },

    /// File not found
    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Sync folder missing or not a folder
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

/// `reason` values Drive uses on 403 responses for throttling.
const RATE_LIMIT_REASONS: &[&str] = &["rateLimitExceeded", "userRateLimitExceeded"];

/// `reason` values Drive uses on 403 responses for credential problems.
const AUTH_REASONS: &[&str] = &["authError", "dailyLimitExceededUnreg", "insufficientPermissions"];

impl GoogleDriveError {
    /// Classify a non-success response.
    ///
    /// `reason` is the first `error.errors[].reason` of the body, if any.
    pub fn from_status(
        status_code: u16,
        reason: Option<&str>,
        message: String,
        retry_after_seconds: Option<u64>,
        object_id: Option<&str>,
    ) -> Self {
        let reason = reason.unwrap_or_default();
        match status_code {
            401 => GoogleDriveError::AuthenticationFailed(message),
            403 if RATE_LIMIT_REASONS.contains(&reason) => GoogleDriveError::RateLimitExceeded {
                retry_after_seconds: retry_after_seconds.unwrap_or(0),
            },
            403 if AUTH_REASONS.contains(&reason) => GoogleDriveError::AuthenticationFailed(message),
            404 => match object_id {
                Some(id) => GoogleDriveError::FileNotFound {
                    file_id: id.to_string(),
                },
                None => GoogleDriveError::ApiError {
                    status_code,
                    message,
                },
            },
            429 => GoogleDriveError::RateLimitExceeded {
                retry_after_seconds: retry_after_seconds.unwrap_or(0),
            },
            _ => GoogleDriveError::ApiError {
                status_code,
                message,
            },
        }
    }
}

impl From<GoogleDriveError> for BridgeError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::AuthenticationFailed(msg) => BridgeError::Unauthorized(msg),
            GoogleDriveError::ApiError {
                status_code,
                message,
            } => {
                let detail = format!("API error (status {}): {}", status_code, message);
                match status_code {
                    401 => BridgeError::Unauthorized(detail),
                    404 => BridgeError::NotFound(detail),
                    429 | 500..=599 => BridgeError::Transient(detail),
                    _ => BridgeError::OperationFailed(detail),
                }
            }
            GoogleDriveError::RateLimitExceeded {
                retry_after_seconds,
            } => BridgeError::Transient(format!(
                "Rate limit exceeded, retry after {} seconds",
                retry_after_seconds
            )),
            GoogleDriveError::FileNotFound { file_id } => {
                BridgeError::NotFound(format!("File not found: {}", file_id))
            }
            GoogleDriveError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            GoogleDriveError::NetworkError(msg) => BridgeError::Network(msg),
            GoogleDriveError::FolderNotFound(title) => {
                BridgeError::NotFound(format!("Folder not found: {}", title))
            }
            GoogleDriveError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = GoogleDriveError::ApiError {
            status_code: 400,
            message: "Bad query".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Google Drive API error (status 400): Bad query"
        );
    }

    #[test]
    fn test_status_classification() {
        let unauthorized: BridgeError =
            GoogleDriveError::from_status(401, None, "expired".into(), None, None).into();
        assert!(unauthorized.is_unauthorized());

        let auth_403: BridgeError =
            GoogleDriveError::from_status(403, Some("authError"), "bad".into(), None, None).into();
        assert!(auth_403.is_unauthorized());

        let throttled: BridgeError = GoogleDriveError::from_status(
            403,
            Some("userRateLimitExceeded"),
            "slow down".into(),
            None,
            None,
        )
        .into();
        assert!(throttled.is_retryable());

        let missing: BridgeError =
            GoogleDriveError::from_status(404, None, "gone".into(), None, Some("f1")).into();
        assert!(missing.is_not_found());

        let server: BridgeError =
            GoogleDriveError::from_status(503, None, "backend".into(), None, None).into();
        assert!(server.is_retryable());

        let bad_request: BridgeError =
            GoogleDriveError::from_status(400, None, "invalid".into(), None, None).into();
        assert!(matches!(bad_request, BridgeError::OperationFailed(_)));
    }

    #[test]
    fn test_forbidden_without_reason_is_not_retried() {
        let error: BridgeError =
            GoogleDriveError::from_status(403, Some("forbidden"), "no".into(), None, None).into();
        assert!(!error.is_retryable());
        assert!(!error.is_unauthorized());
    }

    #[test]
    fn test_bridge_error_passthrough() {
        let error = GoogleDriveError::from(BridgeError::Network("reset".into()));
        let bridge_error: BridgeError = error.into();
        assert!(matches!(bridge_error, BridgeError::Network(_)));
    }
}
