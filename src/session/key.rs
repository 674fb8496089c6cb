//! Session keys and keying modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// File a connection edits when the path names none.
pub const DEFAULT_FILE: &str = "main.tex";

/// How connections are grouped into sessions.
///
/// Chosen per deployment: `Project` puts every editor of a project into one
/// stream, `ProjectFile` gives each file of a project its own stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    Project,
    #[default]
    ProjectFile,
}

impl KeyMode {
    /// Build the session key for a connection path.
    ///
    /// `Project` ignores the file name. `ProjectFile` falls back to
    /// `default_file` when the path names no file.
    pub fn key_for(&self, project: &str, file: Option<&str>, default_file: &str) -> SessionKey {
        match self {
            KeyMode::Project => SessionKey::project(project),
            KeyMode::ProjectFile => {
                SessionKey::file(project, file.filter(|f| !f.is_empty()).unwrap_or(default_file))
            }
        }
    }
}

impl FromStr for KeyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "project" => Ok(KeyMode::Project),
            "file" | "project_file" | "project-file" => Ok(KeyMode::ProjectFile),
            other => Err(format!("unknown key mode '{}'", other)),
        }
    }
}

/// Identifies one collaborative stream: a project, optionally narrowed to a
/// single file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionKey {
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl SessionKey {
    /// Key covering a whole project.
    pub fn project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            file: None,
        }
    }

    /// Key for one file of a project.
    pub fn file(project: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            file: Some(file.into()),
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}/{}", self.project, file),
            None => write!(f, "{}", self.project),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_mode_ignores_file() {
        let key = KeyMode::Project.key_for("proj1", Some("intro.tex"), DEFAULT_FILE);
        assert_eq!(key, SessionKey::project("proj1"));
        assert_eq!(key.to_string(), "proj1");
    }

    #[test]
    fn test_file_mode_defaults_file() {
        let key = KeyMode::ProjectFile.key_for("proj1", None, DEFAULT_FILE);
        assert_eq!(key, SessionKey::file("proj1", "main.tex"));

        let key = KeyMode::ProjectFile.key_for("proj1", Some(""), DEFAULT_FILE);
        assert_eq!(key.to_string(), "proj1/main.tex");

        let key = KeyMode::ProjectFile.key_for("proj1", Some("ch1.tex"), DEFAULT_FILE);
        assert_eq!(key.to_string(), "proj1/ch1.tex");
    }

    #[test]
    fn test_parse_key_mode() {
        assert_eq!("project".parse::<KeyMode>().unwrap(), KeyMode::Project);
        assert_eq!("FILE".parse::<KeyMode>().unwrap(), KeyMode::ProjectFile);
        assert!("room".parse::<KeyMode>().is_err());
    }

    #[test]
    fn test_key_mode_serde() {
        let mode: KeyMode = serde_json::from_str("\"project_file\"").unwrap();
        assert_eq!(mode, KeyMode::ProjectFile);
        assert_eq!(serde_json::to_string(&KeyMode::Project).unwrap(), "\"project\"");
    }
}
