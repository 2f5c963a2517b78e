//! Client configuration

use crate::debounce::DEFAULT_REDIRECT_COOLDOWN;
use crate::error::{ClientError, Result};
use crate::types::LOGIN_PATH;
use std::time::Duration;

/// Deployment flavor; decides how much of a 5xx reaches callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// 5xx bodies are replaced by a generic message
    #[default]
    Production,
    /// 5xx status and body pass through for debugging
    Development,
}

impl Environment {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(ClientError::Configuration(format!(
                "unknown environment '{other}'"
            ))),
        }
    }
}

/// Configuration for the admin client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend origin, without trailing slash
    pub base_url: String,

    /// Per-request timeout, applied to the refresh call as well
    /// Default: 30 seconds
    pub timeout: Duration,

    pub environment: Environment,

    /// Where unrecoverable auth failures send the user
    /// Default: `/login`
    pub login_path: String,

    /// Window in which repeated auth failures produce a single alert
    /// Default: 1000 ms
    pub redirect_cooldown: Duration,

    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            environment: Environment::default(),
            login_path: LOGIN_PATH.to_string(),
            redirect_cooldown: DEFAULT_REDIRECT_COOLDOWN,
            user_agent: concat!("netadmin-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Read `NETADMIN_BASE_URL` (required), `NETADMIN_ENV` and
    /// `NETADMIN_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("NETADMIN_BASE_URL")
            .map_err(|_| ClientError::Configuration("NETADMIN_BASE_URL is not set".to_string()))?;
        let mut config = Self::new(base_url);

        if let Ok(env) = std::env::var("NETADMIN_ENV") {
            config.environment = Environment::parse(&env)?;
        }
        if let Ok(secs) = std::env::var("NETADMIN_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|e| {
                ClientError::Configuration(format!("invalid NETADMIN_TIMEOUT_SECS: {e}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(ClientError::Configuration("base_url is required".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ClientError::Configuration(format!(
                "base_url must be http(s): {}",
                self.base_url
            )));
        }
        if !self.login_path.starts_with('/') {
            return Err(ClientError::Configuration(
                "login_path must be absolute".to_string(),
            ));
        }
        Ok(())
    }
}
