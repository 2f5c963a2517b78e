//! Admin backend client with transparent token refresh

use crate::config::{ClientConfig, Environment};
use crate::coordinator::{RefreshCoordinator, Ticket};
use crate::debounce::RedirectDebouncer;
use crate::error::{ClientError, Result};
use crate::interceptor::{classify, RequestInterceptor};
use crate::navigator::{AuthFailureNotifier, Navigator, TracingNavigator};
use crate::site::SiteContext;
use crate::token_store::TokenStore;
use crate::types::*;
use reqwest::{Client, ClientBuilder, Method};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const NETWORK_ERROR: &str = "Network error, please check your connection";

/// A call against the admin backend
///
/// Cloneable so it can be sent a second time after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Set once the request has been replayed after a refresh
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    fn is_refresh_call(&self) -> bool {
        self.path == REFRESH_PATH
    }

    fn into_retried(mut self) -> Self {
        self.retried = true;
        self
    }
}

struct Inner {
    config: ClientConfig,
    http: Client,
    tokens: TokenStore,
    site: SiteContext,
    interceptor: RequestInterceptor,
    coordinator: Arc<RefreshCoordinator>,
    notifier: AuthFailureNotifier,
}

/// HTTP client for the admin backend
///
/// Attaches the bearer token and site scope to every call. A call that comes
/// back with HTTP 401 or an embedded `-3` code triggers one shared token
/// refresh, after which it is replayed once with the new token. Clones share
/// tokens, site selection and refresh state.
#[derive(Clone)]
pub struct AdminClient {
    inner: Arc<Inner>,
}

impl AdminClient {
    /// Create a client with the default navigator and fresh storage
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> AdminClientBuilder {
        AdminClientBuilder::default()
    }

    pub fn base_url(&self) -> &str {
        &self.inner.config.base_url
    }

    pub fn environment(&self) -> Environment {
        self.inner.config.environment
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.inner.tokens
    }

    pub fn site(&self) -> &SiteContext {
        &self.inner.site
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.coordinator.is_refreshing()
    }

    /// Persist the tokens handed out at login
    ///
    /// Logging in again crosses the login boundary, so the "no permission"
    /// alert is re-armed for the new session.
    pub fn establish_session(&self, tokens: &AuthTokens) {
        self.inner.tokens.store(tokens);
        self.inner.notifier.reset();
        info!("Session established");
    }

    /// Drop credentials and the cached user, then leave for the login page
    pub fn logout(&self) {
        self.inner.tokens.clear();
        self.inner.notifier.redirect_now();
        info!("Logged out");
    }

    /// History back/forward navigation; re-arms the "no permission" alert
    pub fn on_history_navigation(&self) {
        self.inner.notifier.reset();
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<ApiResponse> {
        self.execute(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<ApiResponse> {
        self.execute(ApiRequest::put(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.execute(ApiRequest::delete(path)).await
    }

    /// Send a request, refreshing the session and replaying once if the
    /// backend reports an expired token.
    ///
    /// Envelopes with codes other than `-3` are returned untouched.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let token = match self.dispatch(&request, None).await? {
            ResponseOutcome::Ok(envelope) => return Ok(envelope),
            ResponseOutcome::Fatal(err) => return Err(err),
            ResponseOutcome::AuthRetryable => self.recover(&request).await?,
        };

        let replay = request.into_retried();
        debug!(path = %replay.path, "Replaying request with refreshed token");
        match self.dispatch(&replay, Some(&token)).await? {
            ResponseOutcome::Ok(envelope) => Ok(envelope),
            ResponseOutcome::Fatal(err) => Err(err),
            ResponseOutcome::AuthRetryable => Err(self.reject_retried(&replay)),
        }
    }

    /// Refresh the access token now, joining a refresh already in flight
    pub async fn refresh_now(&self) -> Result<String> {
        self.refresh_single_flight().await
    }

    /// Build, intercept, send and classify one attempt
    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<ResponseOutcome> {
        let url = format!("{}{}", self.inner.config.base_url, request.path);
        let mut builder = self.inner.http.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let mut http_request = builder.build()?;
        self.inner.interceptor.apply(&mut http_request, token);

        let response = self.inner.http.execute(http_request).await.map_err(|e| {
            warn!(path = %request.path, error = %e, "Request failed without a response");
            ClientError::Network(NETWORK_ERROR.to_string())
        })?;

        let status = response.status();
        let body = response.bytes().await?;
        debug!(path = %request.path, status = %status, retried = request.retried, "Response received");

        Ok(classify(status, &body, self.inner.config.environment))
    }

    /// Obtain a fresh access token for a request that failed authentication
    async fn recover(&self, request: &ApiRequest) -> Result<String> {
        if request.is_refresh_call() {
            return Err(self.reject_refresh_call());
        }
        if request.retried {
            return Err(self.reject_retried(request));
        }
        self.refresh_single_flight().await
    }

    async fn refresh_single_flight(&self) -> Result<String> {
        loop {
            match self.inner.coordinator.begin() {
                Ticket::Leader(leader) => {
                    return match self.refresh_tokens().await {
                        Ok(tokens) => {
                            self.inner.tokens.store(&tokens);
                            let delivered = leader.complete(Ok(tokens.access_token.clone()));
                            info!(delivered, "Access token refreshed");
                            Ok(tokens.access_token)
                        }
                        Err(e) => {
                            warn!(error = %e, "Token refresh failed");
                            leader.complete(Err(e.to_string()));
                            Err(self.end_session())
                        }
                    };
                }
                Ticket::Follower(pending) => match pending.await {
                    Ok(token) => return Ok(token),
                    // leader dropped mid-refresh, start over
                    Err(ClientError::Cancelled) => continue,
                    Err(e) => {
                        debug!(error = %e, "Queued request rejected by failed refresh");
                        self.inner.notifier.notify();
                        return Err(ClientError::PermissionDenied);
                    }
                },
            }
        }
    }

    /// The refresh network call. Any non-zero code is a failure.
    async fn refresh_tokens(&self) -> Result<AuthTokens> {
        let refresh_token = self
            .inner
            .tokens
            .refresh_token()
            .ok_or_else(|| ClientError::RefreshFailed("no refresh token".to_string()))?;

        let request = ApiRequest::post(REFRESH_PATH).json(&RefreshRequest { refresh_token })?;
        let envelope = match self.dispatch(&request, None).await? {
            ResponseOutcome::Ok(envelope) => envelope,
            ResponseOutcome::Fatal(err) => return Err(err),
            ResponseOutcome::AuthRetryable => {
                return Err(ClientError::RefreshFailed(
                    "refresh call rejected as unauthorized".to_string(),
                ))
            }
        };

        if !envelope.is_success() {
            return Err(ClientError::RefreshFailed(format!(
                "refresh returned code {}: {}",
                envelope.code,
                envelope.message.as_deref().unwrap_or("no message")
            )));
        }

        let response: RefreshResponse = envelope
            .into_data()
            .map_err(|e| ClientError::RefreshFailed(format!("malformed refresh payload: {e}")))?;
        Ok(response.into())
    }

    /// Unrecoverable auth failure: clear everything and send the user to login
    fn end_session(&self) -> ClientError {
        self.inner.tokens.clear();
        if self.inner.notifier.notify() {
            info!(location = self.inner.notifier.login_path(), "Session ended");
        }
        ClientError::PermissionDenied
    }

    fn reject_refresh_call(&self) -> ClientError {
        warn!("Refresh call was itself rejected as unauthorized");
        self.end_session()
    }

    fn reject_retried(&self, request: &ApiRequest) -> ClientError {
        warn!(path = %request.path, "Request rejected again after token refresh");
        ClientError::PermissionDenied
    }
}

/// Builder for AdminClient
#[derive(Default)]
pub struct AdminClientBuilder {
    config: Option<ClientConfig>,
    base_url: Option<String>,
    environment: Option<Environment>,
    timeout: Option<Duration>,
    login_path: Option<String>,
    redirect_cooldown: Option<Duration>,
    navigator: Option<Arc<dyn Navigator>>,
    tokens: Option<TokenStore>,
    site: Option<SiteContext>,
}

impl AdminClientBuilder {
    /// Start from a full configuration; individual setters override it
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = Some(path.into());
        self
    }

    pub fn redirect_cooldown(mut self, cooldown: Duration) -> Self {
        self.redirect_cooldown = Some(cooldown);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Share an existing token store
    pub fn token_store(mut self, tokens: TokenStore) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Share an existing site selection
    pub fn site_context(mut self, site: SiteContext) -> Self {
        self.site = Some(site);
        self
    }

    pub fn build(self) -> Result<AdminClient> {
        let mut config = match (self.config, self.base_url) {
            (Some(config), Some(url)) => ClientConfig {
                base_url: url,
                ..config
            },
            (None, Some(url)) => ClientConfig::new(url),
            (Some(config), None) => config,
            (None, None) => {
                return Err(ClientError::Configuration("base_url is required".to_string()))
            }
        };
        if let Some(environment) = self.environment {
            config.environment = environment;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(login_path) = self.login_path {
            config.login_path = login_path;
        }
        if let Some(cooldown) = self.redirect_cooldown {
            config.redirect_cooldown = cooldown;
        }
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        config.validate()?;

        let http = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        let tokens = self.tokens.unwrap_or_default();
        let site = self.site.unwrap_or_default();
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(TracingNavigator));
        let notifier = AuthFailureNotifier::new(
            navigator,
            RedirectDebouncer::new(config.redirect_cooldown),
            config.login_path.clone(),
        );

        debug!(base_url = %config.base_url, environment = ?config.environment, "Admin client created");

        Ok(AdminClient {
            inner: Arc::new(Inner {
                interceptor: RequestInterceptor::new(tokens.clone(), site.clone()),
                coordinator: RefreshCoordinator::new(),
                config,
                http,
                tokens,
                site,
                notifier,
            }),
        })
    }
}
