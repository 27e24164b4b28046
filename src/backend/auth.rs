//! Authentication for backend requests
//!
//! Supports both static and dynamic credentials:
//! - Static: token or key set once at creation
//! - Dynamic: callback that provides fresh credentials before each request
//!
//! Token lifecycle (login, refresh) lives outside this crate; callers plug it
//! in through an `AuthProvider`.
//!
//! # Example: Dynamic auth with JWT refresh
//!
//! ```ignore
//! use shadow_chat_sdk::backend::{AuthConfig, HttpBackend};
//!
//! let backend = HttpBackend::new("http://localhost:8000")?.with_auth_provider(|| async {
//!     let jwt = refresh_jwt().await?;
//!     Ok(AuthConfig::bearer(jwt))
//! });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::core::ChatResult;

/// Header carrying a service API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Credentials attached to backend requests
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Bearer token sent as `Authorization: Bearer <token>`
    pub bearer_token: Option<String>,
    /// Service key sent as `X-API-Key`
    pub api_key: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("AuthConfig")
            .field("bearer_token", &redact(&self.bearer_token))
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl AuthConfig {
    /// No credentials
    pub fn none() -> Self {
        Self::default()
    }

    /// Authenticate with a bearer token
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
            api_key: None,
        }
    }

    /// Authenticate with a service API key
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            bearer_token: None,
            api_key: Some(key.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bearer_token.is_none() && self.api_key.is_none()
    }

    /// Header name/value pairs for these credentials
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(token) = &self.bearer_token {
            headers.push(("Authorization", format!("Bearer {}", token)));
        }
        if let Some(key) = &self.api_key {
            headers.push((API_KEY_HEADER, key.clone()));
        }
        headers
    }

    /// Attach these credentials to a reqwest request
    pub fn apply(&self, mut builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (name, value) in self.headers() {
            builder = builder.header(name, value);
        }
        builder
    }
}

/// Type alias for the boxed future returned by auth providers
pub type AuthFuture<'a> = Pin<Box<dyn Future<Output = ChatResult<AuthConfig>> + Send + 'a>>;

/// Trait for providing credentials dynamically
///
/// Called before each request and each channel handshake. Implementations
/// handle caching and refresh internally.
pub trait AuthProvider: Send + Sync {
    fn get_auth(&self) -> AuthFuture<'_>;
}

/// Wrapper to implement AuthProvider for async closures
pub struct FnAuthProvider<F> {
    func: F,
}

impl<F, Fut> AuthProvider for FnAuthProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ChatResult<AuthConfig>> + Send + 'static,
{
    fn get_auth(&self) -> AuthFuture<'_> {
        Box::pin((self.func)())
    }
}

/// Create an auth provider from an async closure
pub fn auth_provider<F, Fut>(func: F) -> FnAuthProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ChatResult<AuthConfig>> + Send + 'static,
{
    FnAuthProvider { func }
}

/// Where credentials come from - either static or dynamic
#[derive(Clone)]
pub enum AuthSource {
    /// Static credentials set at creation time
    Static(AuthConfig),
    /// Dynamic credentials from a provider
    Dynamic(Arc<dyn AuthProvider>),
}

impl AuthSource {
    /// Get auth config (either returns static or calls provider)
    pub async fn get_auth(&self) -> ChatResult<AuthConfig> {
        match self {
            AuthSource::Static(config) => Ok(config.clone()),
            AuthSource::Dynamic(provider) => provider.get_auth().await,
        }
    }
}

impl Default for AuthSource {
    fn default() -> Self {
        AuthSource::Static(AuthConfig::none())
    }
}

impl std::fmt::Debug for AuthSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthSource::Static(config) if config.is_empty() => write!(f, "AuthSource::None"),
            AuthSource::Static(_) => write!(f, "AuthSource::Static(..)"),
            AuthSource::Dynamic(_) => write!(f, "AuthSource::Dynamic(..)"),
        }
    }
}
