//! API router configuration.

use std::sync::Arc;

use axum::{
    extract::Request,
    middleware,
    routing::{any, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    api_info, create_project, get_file, get_project, health, latest_compile, list_projects,
    list_sessions, submit_compile, task_status, AppState,
};
use super::websocket::{ws_file_handler, ws_project_handler};
use crate::error::CollabError;
use crate::security::{auth_middleware, AuthConfig, TokenStore};

/// Request span without the query string, which may carry a token.
fn request_span(request: &Request) -> tracing::Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        version = ?request.version(),
    )
}

/// Create the API router with all routes configured.
pub fn create_router() -> Router {
    create_router_with_state(AppState::new())
}

/// Create the API router with custom state and no authentication.
pub fn create_router_with_state(state: AppState) -> Router {
    create_router_with_auth(state, Arc::new(TokenStore::disabled()))
}

/// Create the API router with every route behind the given token store.
pub fn create_router_with_auth(state: AppState, tokens: Arc<TokenStore>) -> Router {
    let api_v1 = Router::new()
        .route("/", get(api_info))
        .route("/sessions", get(list_sessions));

    let project_routes = Router::new()
        .route("/", get(list_projects).post(create_project))
        .route("/{id}", get(get_project))
        .route("/{id}/files/{*file}", get(get_file))
        .route("/{id}/compile", get(latest_compile).post(submit_compile));

    Router::new()
        .route("/health", get(health))
        .route("/tasks/{task_id}", get(task_status))
        .route("/ws/{project_id}", any(ws_project_handler))
        .route("/ws/{project_id}/{*file}", any(ws_file_handler))
        .nest("/api/v1", api_v1)
        .nest("/projects", project_routes)
        .layer(middleware::from_fn_with_state(tokens, auth_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    pub auth: AuthConfig,
    /// Accepted bearer tokens.
    pub tokens: Vec<String>,
    /// Stop on Ctrl-C after in-flight requests finish.
    pub graceful_shutdown: bool,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.tokens.push(token.into());
        self
    }

    pub fn without_graceful_shutdown(mut self) -> Self {
        self.graceful_shutdown = false;
        self
    }

    /// Token store holding every configured token.
    pub fn token_store(&self) -> Arc<TokenStore> {
        let store = TokenStore::new(self.auth.clone());
        for token in &self.tokens {
            store.add_token(token.as_str());
        }
        Arc::new(store)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            auth: AuthConfig::disabled(),
            tokens: Vec::new(),
            graceful_shutdown: true,
        }
    }
}

/// Start the API server.
pub async fn serve(config: ServerConfig) -> crate::Result<()> {
    serve_with_state(config, AppState::new()).await
}

/// Start the API server with custom state.
pub async fn serve_with_state(config: ServerConfig, state: AppState) -> crate::Result<()> {
    let addr = config.bind_address();
    let router = create_router_with_auth(state, config.token_store());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        auth = config.auth.enabled,
        "texcollab listening on {}",
        listener.local_addr()?
    );

    let server = axum::serve(listener, router);
    let result = if config.graceful_shutdown {
        server.with_graceful_shutdown(shutdown_signal()).await
    } else {
        server.await
    };
    result.map_err(|e| CollabError::Io(std::io::Error::other(e.to_string())))?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
