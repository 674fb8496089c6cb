//! Project model.

use std::collections::BTreeMap;
use std::path::{Component, Path};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::CollabError;
use crate::session::DEFAULT_FILE;
use crate::Result;

/// Owner assigned when a project is created without one.
pub const DEFAULT_OWNER: &str = "user1";

/// Body of the main file of a freshly created project.
pub const DEFAULT_CONTENT: &str =
    "\\documentclass{article}\n\\begin{document}\nHello World\n\\end{document}";

/// A LaTeX project: metadata plus the text of every file.
#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    /// Creation time, seconds since the Unix epoch.
    pub created_at: u64,
    /// File handed to the LaTeX engine.
    pub main_file: String,
    pub files: BTreeMap<String, String>,
}

impl Project {
    /// New project containing the default `main.tex`.
    pub fn new(id: impl Into<String>, name: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut files = BTreeMap::new();
        files.insert(DEFAULT_FILE.to_string(), DEFAULT_CONTENT.to_string());

        Self {
            id: id.into(),
            name: name.into(),
            owner_id: owner_id.into(),
            created_at,
            main_file: DEFAULT_FILE.to_string(),
            files,
        }
    }

    pub fn file(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }
}

/// Reject file names that are empty or would leave the project directory.
///
/// Sub-directories such as `figures/plot.tex` are allowed.
pub fn validate_file_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CollabError::InvalidFileName(name.to_string()));
    }
    let path = Path::new(name);
    let clean = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !clean || name.contains('\\') {
        return Err(CollabError::InvalidFileName(name.to_string()));
    }
    Ok(())
}
