//! Network Admin Client
//!
//! HTTP client core for the network-operator admin backend: bearer and site
//! scoping on every request, single-flight token refresh when the backend
//! reports an expired session (HTTP 401 or an embedded `-3` code), and a
//! debounced redirect to the login boundary when the session cannot be
//! recovered.

pub mod client;
pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod error;
pub mod interceptor;
pub mod navigator;
pub mod site;
pub mod token_store;
pub mod types;

pub use client::{AdminClient, AdminClientBuilder, ApiRequest};
pub use config::{ClientConfig, Environment};
pub use error::{ClientError, ErrorBody, Result};
pub use navigator::{Navigator, TracingNavigator};
pub use site::SiteContext;
pub use token_store::TokenStore;
pub use types::{ApiResponse, AuthTokens};
