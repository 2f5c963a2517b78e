//! Wire types and token helpers

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClientError, Result};

/// Envelope code for a successful call
pub const SUCCESS_CODE: i64 = 0;

/// Envelope code meaning "token expired or insufficient permission"
pub const AUTH_EXPIRED_CODE: i64 = -3;

/// Site id that means "no site selected"
pub const DEFAULT_SITE: &str = "default";

pub const REFRESH_PATH: &str = "/v1/auth_management/refresh_token";

pub const LOGIN_PATH: &str = "/login";

const BEARER_PREFIX: &str = "Bearer ";

/// Prefix `token` with `Bearer ` unless it already carries it.
pub fn normalize_bearer(token: &str) -> String {
    if token.starts_with(BEARER_PREFIX) {
        token.to_string()
    } else {
        format!("{BEARER_PREFIX}{token}")
    }
}

/// Authentication tokens (access + refresh)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    /// Always in `Bearer <token>` form once stored
    pub access_token: String,
    pub refresh_token: String,
}

impl AuthTokens {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Response envelope shared by every backend endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Decode `data` into a typed value. A missing `data` decodes as `null`.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T> {
        Ok(serde_json::from_value(self.data.unwrap_or(Value::Null))?)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<RefreshResponse> for AuthTokens {
    fn from(resp: RefreshResponse) -> Self {
        AuthTokens::new(normalize_bearer(&resp.access_token), resp.refresh_token)
    }
}

/// What a response means for the caller, decoded from status and body
#[derive(Debug)]
pub enum ResponseOutcome {
    Ok(ApiResponse),
    /// HTTP 401 or an embedded `-3`; recoverable through a token refresh
    AuthRetryable,
    Fatal(ClientError),
}
