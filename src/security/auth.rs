//! Bearer token authentication.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use axum::{
    extract::{Query, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// Query parameter accepted in place of the header.
///
/// Browsers cannot set headers on a WebSocket handshake, so editors pass the
/// token as `?token=...` on the `/ws` URL instead.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// Token authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Whether authentication is enabled.
    pub enabled: bool,
    /// Prefix of the Authorization header value.
    pub prefix: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: "Bearer ".to_string(),
        }
    }
}

impl AuthConfig {
    /// Create a disabled auth config (for development).
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Thread-safe set of accepted bearer tokens.
///
/// Tokens are issued by the identity provider; this store only validates.
#[derive(Debug)]
pub struct TokenStore {
    tokens: RwLock<HashSet<String>>,
    config: AuthConfig,
}

impl TokenStore {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            tokens: RwLock::new(HashSet::new()),
            config,
        }
    }

    /// Create a store with authentication disabled.
    pub fn disabled() -> Self {
        Self::new(AuthConfig::disabled())
    }

    /// Accept a token.
    pub fn add_token(&self, token: impl Into<String>) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.insert(token.into());
        }
    }

    /// Revoke a token.
    pub fn remove_token(&self, token: &str) -> bool {
        self.tokens
            .write()
            .map(|mut tokens| tokens.remove(token))
            .unwrap_or(false)
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.tokens
            .read()
            .map(|tokens| tokens.contains(token))
            .unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.tokens.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Extract the token from an Authorization header value.
    pub fn extract_token<'a>(&self, header_value: &'a str) -> Option<&'a str> {
        header_value.strip_prefix(self.config.prefix.as_str())
    }

    /// Find a token in the Authorization header or the query string.
    ///
    /// The query value is percent-decoded, as browsers send it through
    /// `encodeURIComponent`.
    pub fn token_from_request(&self, request: &Request) -> Option<String> {
        let from_header = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| self.extract_token(v));
        if let Some(token) = from_header {
            return Some(token.to_string());
        }

        let Query(mut params) =
            Query::<HashMap<String, String>>::try_from_uri(request.uri()).ok()?;
        params.remove(TOKEN_QUERY_PARAM)
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(AuthConfig::default())
    }
}

/// Authentication middleware for axum.
pub async fn auth_middleware(
    State(store): State<Arc<TokenStore>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !store.is_enabled() || request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let authorized = store
        .token_from_request(&request)
        .is_some_and(|token| store.is_valid(&token));
    if authorized {
        return Ok(next.run(request).await);
    }

    debug!(path = %request.uri().path(), "rejected unauthenticated request");
    Err(StatusCode::UNAUTHORIZED)
}
