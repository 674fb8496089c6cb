//! REST API handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use super::types::{
    api_error, ApiError, CompileResponse, CreateProjectRequest, CreateProjectResponse,
    ErrorResponse, ListSessionsResponse, TaskQuery, TaskStatusResponse,
};
use crate::compile::{CompileBackend, CompileDispatcher, JobId, LatexCompiler};
use crate::error::CollabError;
use crate::session::{ChannelConfig, KeyMode, SessionRegistry, DEFAULT_FILE};
use crate::store::{MemoryProjectStore, Project, ProjectStore, DEFAULT_OWNER};

/// Build directory used when none is configured.
pub const DEFAULT_BUILDS_DIR: &str = "builds";

/// Longest a status request may be held open.
pub const MAX_WAIT: Duration = Duration::from_secs(60);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<dyn ProjectStore>,
    pub dispatcher: Arc<CompileDispatcher>,
    /// How socket paths map to session keys.
    pub key_mode: KeyMode,
    /// File edited by connections that name none.
    pub default_file: String,
}

impl AppState {
    /// In-memory store, default channel settings, `pdflatex` into `builds/`.
    pub fn new() -> Self {
        Self::from_parts(
            Arc::new(MemoryProjectStore::new()),
            Arc::new(LatexCompiler::new(DEFAULT_BUILDS_DIR)),
            ChannelConfig::default(),
        )
    }

    /// Assemble state from explicit collaborators.
    pub fn from_parts(
        store: Arc<dyn ProjectStore>,
        backend: Arc<dyn CompileBackend>,
        channel: ChannelConfig,
    ) -> Self {
        let dispatcher = Arc::new(CompileDispatcher::new(Arc::clone(&store), backend));
        Self {
            registry: Arc::new(SessionRegistry::new(channel)),
            store,
            dispatcher,
            key_mode: KeyMode::default(),
            default_file: DEFAULT_FILE.to_string(),
        }
    }

    pub fn with_key_mode(mut self, mode: KeyMode) -> Self {
        self.key_mode = mode;
        self
    }

    pub fn with_default_file(mut self, file: impl Into<String>) -> Self {
        self.default_file = file.into();
        self
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint.
pub async fn api_info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "texcollab",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "key_mode": state.key_mode,
        "echo_to_sender": state.registry.config().echo_to_sender,
    }))
}

/// List live collaboration sessions.
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<ListSessionsResponse>, ApiError> {
    let sessions = state.registry.summaries().map_err(api_error)?;
    Ok(Json(ListSessionsResponse {
        count: sessions.len(),
        sessions,
        stats: state.registry.stats(),
    }))
}

/// Create a project.
pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<CreateProjectResponse>), ApiError> {
    if req.name.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("project name must not be empty")),
        ));
    }
    let owner = req.owner_id.as_deref().unwrap_or(DEFAULT_OWNER);
    let project = state
        .store
        .create_project(&req.name, owner)
        .map_err(api_error)?;

    tracing::info!(project = %project.id, name = %project.name, "project created");
    Ok((
        StatusCode::CREATED,
        Json(CreateProjectResponse {
            id: project.id,
            name: project.name,
        }),
    ))
}

/// List all projects.
pub async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>, ApiError> {
    state.store.list_projects().map(Json).map_err(api_error)
}

/// Get one project with its files.
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Project>, ApiError> {
    state
        .store
        .get_project(&id)
        .map_err(api_error)?
        .map(Json)
        .ok_or_else(|| api_error(CollabError::ProjectNotFound(id)))
}

/// Raw text of one project file.
pub async fn get_file(
    State(state): State<AppState>,
    Path((id, file)): Path<(String, String)>,
) -> Result<String, ApiError> {
    state.store.load_document(&id, &file).map_err(api_error)
}

/// Submit a compile job for a project.
pub async fn submit_compile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<CompileResponse>), ApiError> {
    let job = state.dispatcher.submit(&id).map_err(api_error)?;
    Ok((StatusCode::ACCEPTED, Json(CompileResponse::new(job))))
}

/// Status of the newest compile job of a project.
pub async fn latest_compile(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskStatusResponse>, ApiError> {
    let job = state
        .dispatcher
        .latest_for_project(&id)
        .ok_or_else(|| api_error(CollabError::JobNotFound(format!("no compile for {}", id))))?;
    let status = state.dispatcher.status(job).map_err(api_error)?;
    Ok(Json(TaskStatusResponse::new(job, status)))
}

/// Status of one compile job.
///
/// With `?wait_secs=N` the request is held until the job is terminal or
/// `N` seconds pass, whichever comes first.
pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<TaskStatusResponse>, ApiError> {
    let job: JobId = task_id.parse().map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request(format!(
                "malformed task id '{}'",
                task_id
            ))),
        )
    })?;

    if let Some(secs) = query.wait_secs.filter(|s| *s > 0) {
        let wait = Duration::from_secs(secs).min(MAX_WAIT);
        if let Ok(done) = tokio::time::timeout(wait, state.dispatcher.wait(job)).await {
            let status = done.map_err(api_error)?;
            return Ok(Json(TaskStatusResponse::new(job, status)));
        }
    }

    let status = state.dispatcher.status(job).map_err(api_error)?;
    Ok(Json(TaskStatusResponse::new(job, status)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_new() {
        let state = AppState::new();
        assert_eq!(state.registry.session_count(), 0);
        assert_eq!(state.key_mode, KeyMode::ProjectFile);
        assert_eq!(state.default_file, "main.tex");
    }

    #[test]
    fn test_app_state_builders() {
        let state = AppState::new()
            .with_key_mode(KeyMode::Project)
            .with_default_file("paper.tex");
        assert_eq!(state.key_mode, KeyMode::Project);
        assert_eq!(state.default_file, "paper.tex");
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        assert_eq!(health().await, "OK");
    }

    #[tokio::test]
    async fn test_api_info_endpoint() {
        let json = api_info(State(AppState::new())).await.0;
        assert_eq!(json["name"], "texcollab");
        assert_eq!(json["status"], "running");
        assert_eq!(json["key_mode"], "project_file");
        assert_eq!(json["echo_to_sender"], false);
    }
}
