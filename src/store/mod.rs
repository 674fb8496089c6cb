//! Project storage.
//!
//! The relay itself never owns document text. The WebSocket layer reads the
//! initial content of a file from a [`ProjectStore`] and writes every relayed
//! snapshot back to it; the compile dispatcher reads project files from it.

mod memory;
mod project;

pub use memory::MemoryProjectStore;
pub use project::{validate_file_name, Project, DEFAULT_CONTENT, DEFAULT_OWNER};

use crate::Result;

/// Durable home of project metadata and file contents.
pub trait ProjectStore: Send + Sync {
    /// Create a project with the default main file.
    fn create_project(&self, name: &str, owner_id: &str) -> Result<Project>;

    /// All projects, ordered by ID.
    fn list_projects(&self) -> Result<Vec<Project>>;

    fn get_project(&self, id: &str) -> Result<Option<Project>>;

    /// Text of one file of a project.
    fn load_document(&self, project: &str, file: &str) -> Result<String>;

    /// Replace (or create) one file of an existing project.
    fn save_document(&self, project: &str, file: &str, content: &str) -> Result<()>;
}
