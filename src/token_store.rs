//! Thread-safe cookie and session storage using Papaya HashMap

use crate::types::{normalize_bearer, AuthTokens};
use papaya::HashMap;
use serde_json::Value;
use std::sync::Arc;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_KEY: &str = "user";

/// Thread-safe token store using Papaya HashMap
///
/// `cookies` holds the credentials (path `/`), `local` holds the cached
/// session user. Clones share the same storage.
#[derive(Clone)]
pub struct TokenStore {
    cookies: Arc<HashMap<String, String>>,
    local: Arc<HashMap<String, Value>>,
}

impl TokenStore {
    /// Create a new, empty token store
    pub fn new() -> Self {
        Self {
            cookies: Arc::new(HashMap::new()),
            local: Arc::new(HashMap::new()),
        }
    }

    /// Store the access token in `Bearer <token>` form
    pub fn set_access_token(&self, token: &str) {
        self.cookies
            .pin()
            .insert(ACCESS_TOKEN_KEY.to_string(), normalize_bearer(token));
    }

    pub fn access_token(&self) -> Option<String> {
        self.cookies.pin().get(ACCESS_TOKEN_KEY).cloned()
    }

    pub fn set_refresh_token(&self, token: &str) {
        self.cookies
            .pin()
            .insert(REFRESH_TOKEN_KEY.to_string(), token.to_string());
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.cookies.pin().get(REFRESH_TOKEN_KEY).cloned()
    }

    /// Persist both tokens together
    pub fn store(&self, tokens: &AuthTokens) {
        self.set_access_token(&tokens.access_token);
        self.set_refresh_token(&tokens.refresh_token);
    }

    /// Both tokens, if both are present
    pub fn tokens(&self) -> Option<AuthTokens> {
        Some(AuthTokens::new(self.access_token()?, self.refresh_token()?))
    }

    pub fn has_session(&self) -> bool {
        self.cookies.pin().contains_key(ACCESS_TOKEN_KEY)
    }

    pub fn clear_tokens(&self) {
        let cookies = self.cookies.pin();
        cookies.remove(ACCESS_TOKEN_KEY);
        cookies.remove(REFRESH_TOKEN_KEY);
    }

    pub fn set_user(&self, user: Value) {
        self.local.pin().insert(USER_KEY.to_string(), user);
    }

    pub fn user(&self) -> Option<Value> {
        self.local.pin().get(USER_KEY).cloned()
    }

    pub fn clear_user(&self) {
        self.local.pin().remove(USER_KEY);
    }

    /// Drop credentials and the cached session user
    pub fn clear(&self) {
        self.clear_tokens();
        self.clear_user();
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}
