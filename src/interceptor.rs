//! Request augmentation and response classification

use crate::config::Environment;
use crate::error::ClientError;
use crate::site::SiteContext;
use crate::token_store::TokenStore;
use crate::types::{normalize_bearer, ApiResponse, ResponseOutcome, AUTH_EXPIRED_CODE};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Request, StatusCode};
use serde_json::Value;
use tracing::warn;

pub const SITE_ID_PARAM: &str = "siteId";

const INVALID_FORMAT: &str = "Invalid response format";
const GENERIC_SERVER_ERROR: &str = "Server error";

/// Attaches credentials and tenant scope to outgoing requests
#[derive(Clone)]
pub struct RequestInterceptor {
    tokens: TokenStore,
    site: SiteContext,
}

impl RequestInterceptor {
    pub fn new(tokens: TokenStore, site: SiteContext) -> Self {
        Self { tokens, site }
    }

    /// Set `Authorization` and `siteId`. `token` takes precedence over the
    /// stored access token; replays pass the token the refresh produced.
    pub fn apply(&self, request: &mut Request, token: Option<&str>) {
        let token = token.map(str::to_string).or_else(|| self.tokens.access_token());
        if let Some(token) = token {
            match HeaderValue::from_str(&normalize_bearer(&token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    request.headers_mut().insert(AUTHORIZATION, value);
                }
                Err(e) => warn!(error = %e, "Access token is not a valid header value, sending without it"),
            }
        }

        if let Some(site_id) = self.site.scoped_site() {
            let url = request.url_mut();
            let kept: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(key, _)| key != SITE_ID_PARAM)
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(kept)
                .append_pair(SITE_ID_PARAM, &site_id);
        }
    }
}

/// Decode a response into what it means for the caller.
///
/// HTTP 401 and an embedded `code == -3` both come back as
/// [`ResponseOutcome::AuthRetryable`].
pub fn classify(status: StatusCode, body: &[u8], environment: Environment) -> ResponseOutcome {
    if status == StatusCode::UNAUTHORIZED {
        return ResponseOutcome::AuthRetryable;
    }

    if status.is_server_error() {
        let message = match environment {
            Environment::Production => GENERIC_SERVER_ERROR.to_string(),
            Environment::Development => String::from_utf8_lossy(body).into_owned(),
        };
        return ResponseOutcome::Fatal(ClientError::Server {
            status: status.as_u16(),
            message,
        });
    }

    if !status.is_success() {
        let text = String::from_utf8_lossy(body);
        let message = if text.trim().is_empty() {
            status.canonical_reason().unwrap_or("request failed").to_string()
        } else {
            text.into_owned()
        };
        return ResponseOutcome::Fatal(ClientError::Status {
            status: status.as_u16(),
            message,
        });
    }

    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(_) => return invalid_format(),
    };
    match value.get("code").and_then(Value::as_i64) {
        Some(AUTH_EXPIRED_CODE) => ResponseOutcome::AuthRetryable,
        Some(_) if value.is_object() => match serde_json::from_value::<ApiResponse>(value) {
            Ok(envelope) => ResponseOutcome::Ok(envelope),
            Err(_) => invalid_format(),
        },
        _ => invalid_format(),
    }
}

fn invalid_format() -> ResponseOutcome {
    ResponseOutcome::Fatal(ClientError::InvalidResponse(INVALID_FORMAT.to_string()))
}
