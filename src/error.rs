//! Error types for texcollab.

use thiserror::Error;

/// Main error type for texcollab operations.
#[derive(Error, Debug)]
pub enum CollabError {
    /// Project with the given ID was not found.
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// File does not exist in the project.
    #[error("file not found: {project}/{file}")]
    FileNotFound { project: String, file: String },

    /// Compile job with the given ID was not found.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// The participant handle has already been disconnected.
    #[error("participant not connected: {0}")]
    ParticipantNotConnected(String),

    /// Transport handshake failed.
    #[error("connection rejected: {0}")]
    ConnectionRejected(String),

    /// Transport dropped mid-session.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// File name is empty or escapes the project directory.
    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    /// Compilation could not be carried out.
    #[error("compile error: {0}")]
    Compile(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,
}

/// Convenience Result type for texcollab operations.
pub type Result<T> = std::result::Result<T, CollabError>;
