//! In-process project store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use super::project::{validate_file_name, Project};
use super::ProjectStore;
use crate::error::CollabError;
use crate::Result;

/// Thread-safe, non-durable [`ProjectStore`].
#[derive(Debug)]
pub struct MemoryProjectStore {
    projects: RwLock<HashMap<String, Project>>,
    next_id: AtomicU64,
}

impl MemoryProjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Insert a project under its own ID, replacing any previous one.
    pub fn insert(&self, project: Project) -> Result<()> {
        let mut projects = self
            .projects
            .write()
            .map_err(|_| CollabError::LockPoisoned)?;
        projects.insert(project.id.clone(), project);
        Ok(())
    }

    /// Number of stored projects.
    pub fn count(&self) -> usize {
        self.projects.read().map(|p| p.len()).unwrap_or(0)
    }
}

impl Default for MemoryProjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectStore for MemoryProjectStore {
    fn create_project(&self, name: &str, owner_id: &str) -> Result<Project> {
        let id = format!("proj-{:08x}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let project = Project::new(id, name, owner_id);
        self.insert(project.clone())?;
        Ok(project)
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        let projects = self
            .projects
            .read()
            .map_err(|_| CollabError::LockPoisoned)?;
        let mut list: Vec<Project> = projects.values().cloned().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(list)
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let projects = self
            .projects
            .read()
            .map_err(|_| CollabError::LockPoisoned)?;
        Ok(projects.get(id).cloned())
    }

    fn load_document(&self, project: &str, file: &str) -> Result<String> {
        let projects = self
            .projects
            .read()
            .map_err(|_| CollabError::LockPoisoned)?;
        let entry = projects
            .get(project)
            .ok_or_else(|| CollabError::ProjectNotFound(project.to_string()))?;
        entry
            .file(file)
            .map(str::to_string)
            .ok_or_else(|| CollabError::FileNotFound {
                project: project.to_string(),
                file: file.to_string(),
            })
    }

    fn save_document(&self, project: &str, file: &str, content: &str) -> Result<()> {
        validate_file_name(file)?;
        let mut projects = self
            .projects
            .write()
            .map_err(|_| CollabError::LockPoisoned)?;
        let entry = projects
            .get_mut(project)
            .ok_or_else(|| CollabError::ProjectNotFound(project.to_string()))?;
        entry.files.insert(file.to_string(), content.to_string());
        Ok(())
    }
}
