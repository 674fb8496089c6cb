//! API request and response types.

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::compile::{JobId, JobStatus};
use crate::error::CollabError;
use crate::session::{RegistryStats, SessionSummary};

/// Request to create a project.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    /// Owner; the default user when omitted.
    #[serde(default)]
    pub owner_id: Option<String>,
}

/// Response for project creation.
#[derive(Debug, Clone, Serialize)]
pub struct CreateProjectResponse {
    pub id: String,
    pub name: String,
}

/// Response for a compile submission.
#[derive(Debug, Clone, Serialize)]
pub struct CompileResponse {
    pub task_id: String,
}

impl CompileResponse {
    pub fn new(id: JobId) -> Self {
        Self {
            task_id: id.to_string(),
        }
    }
}

/// Status of one compile job.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: String,
    #[serde(flatten)]
    pub status: JobStatus,
}

impl TaskStatusResponse {
    pub fn new(id: JobId, status: JobStatus) -> Self {
        Self {
            task_id: id.to_string(),
            status,
        }
    }
}

/// Query parameters of the task status endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskQuery {
    /// Hold the request open up to this many seconds for a terminal state.
    #[serde(default)]
    pub wait_secs: Option<u64>,
}

/// Live collaboration sessions.
#[derive(Debug, Clone, Serialize)]
pub struct ListSessionsResponse {
    pub count: usize,
    pub sessions: Vec<SessionSummary>,
    pub stats: RegistryStats,
}

/// Generic API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "PROJECT_NOT_FOUND").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }
}

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a crate error onto a status code and error body.
pub fn api_error(err: CollabError) -> ApiError {
    let (status, code) = match &err {
        CollabError::ProjectNotFound(_) => (StatusCode::NOT_FOUND, "PROJECT_NOT_FOUND"),
        CollabError::FileNotFound { .. } => (StatusCode::NOT_FOUND, "FILE_NOT_FOUND"),
        CollabError::JobNotFound(_) => (StatusCode::NOT_FOUND, "JOB_NOT_FOUND"),
        CollabError::InvalidFileName(_) => (StatusCode::BAD_REQUEST, "INVALID_FILE_NAME"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    };
    (status, Json(ErrorResponse::new(code, err.to_string())))
}
