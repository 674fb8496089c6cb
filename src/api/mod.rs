//! HTTP and WebSocket surface of texcollab.
//!
//! ## Endpoints
//!
//! ### Health & Info
//! - `GET /health` - Health check (never authenticated)
//! - `GET /api/v1` - API information
//! - `GET /api/v1/sessions` - Live collaboration sessions
//!
//! ### Projects
//! - `GET /projects` - List projects
//! - `POST /projects` - Create a project
//! - `GET /projects/{id}` - Project with its files
//! - `GET /projects/{id}/files/{file}` - Raw file text
//! - `POST /projects/{id}/compile` - Submit a compile job
//! - `GET /projects/{id}/compile` - Status of the latest job
//! - `GET /tasks/{task_id}` - Status of one job (`?wait_secs=N` to long-poll)
//!
//! ### Collaboration
//! - `WS /ws/{project_id}` - Channel for the project's default file
//! - `WS /ws/{project_id}/{file}` - Channel for one file
//!
//! ## Example
//!
//! ```no_run
//! use texcollab::api::{serve, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> texcollab::Result<()> {
//!     let config = ServerConfig::new("127.0.0.1", 3000);
//!     serve(config).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;
pub mod websocket;

pub use handlers::AppState;
pub use router::{
    create_router, create_router_with_auth, create_router_with_state, serve, serve_with_state,
    ServerConfig,
};
pub use types::{
    CompileResponse, CreateProjectRequest, CreateProjectResponse, ErrorResponse,
    ListSessionsResponse, TaskStatusResponse,
};
