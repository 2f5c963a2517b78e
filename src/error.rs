//! Error types for the admin client

use serde::Serialize;
use thiserror::Error;

/// Message shown to callers whenever a session cannot be recovered.
pub const PERMISSION_DENIED_MESSAGE: &str = "You don't have permission, please log in again";

/// Client error types
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No response was received at all
    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Non-2xx status that is neither 401 nor 5xx
    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    InvalidResponse(String),

    #[error("{}", PERMISSION_DENIED_MESSAGE)]
    PermissionDenied,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The request was dropped while waiting on a token refresh
    #[error("Request cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Normalized rejection handed to UI callers
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
        }
    }
}

/// `{ "error": "..." }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let body = ClientError::PermissionDenied.to_body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], PERMISSION_DENIED_MESSAGE);
    }

    #[test]
    fn test_invalid_response_message_is_verbatim() {
        let err = ClientError::InvalidResponse("Invalid response format".to_string());
        assert_eq!(err.to_string(), "Invalid response format");
    }
}
