//! Error types for the Conveyor client

use conveyor_core::ValidationError;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the Conveyor client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP client could not be built or the request could not be sent
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Server answered with `success: false`
    #[error("{message}")]
    ApiError {
        /// HTTP status code, when the server was reached
        status: Option<u16>,
        /// Message from the server, or the transport failure
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Definition rejected before sending
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ApiError { status: Some(404), .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status: Some(s), .. } if (400..500).contains(s))
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status: Some(s), .. } if *s >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_helpers() {
        let err = ClientError::api_error(Some(404), "Pipeline not found");
        assert!(err.is_not_found());
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
        assert_eq!(err.to_string(), "Pipeline not found");

        let err = ClientError::api_error(None, "connection refused");
        assert!(!err.is_not_found());
        assert!(!err.is_client_error());
        assert!(!err.is_server_error());

        assert!(ClientError::api_error(Some(500), "boom").is_server_error());
    }

    #[test]
    fn test_validation_error_message_passes_through() {
        let err = ClientError::from(ValidationError::NoStages);
        assert_eq!(err.to_string(), "Pipeline must have at least one stage");
    }
}
