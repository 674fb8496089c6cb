//! Compile job identifiers and status.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of one compile request, displayed as `job-XXXXXXXX`.
///
/// IDs increase monotonically, so a larger ID is always a later submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn from_raw(value: u64) -> Self {
        Self(value)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{:08x}", self.0)
    }
}

impl FromStr for JobId {
    type Err = crate::error::CollabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("job-")
            .and_then(|hex| u64::from_str_radix(hex, 16).ok())
            .map(JobId)
            .ok_or_else(|| crate::error::CollabError::JobNotFound(s.into()))
    }
}

/// Lifecycle state of a compile job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Success,
    Error,
}

/// Status reported for a job.
///
/// `Success` and `Error` are terminal: once reached, the status of that job
/// never changes again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    /// Engine output or failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
}

impl JobStatus {
    pub fn pending() -> Self {
        Self {
            state: JobState::Pending,
            log: None,
            pdf_path: None,
        }
    }

    pub fn success(pdf_path: impl Into<String>) -> Self {
        Self {
            state: JobState::Success,
            log: None,
            pdf_path: Some(pdf_path.into()),
        }
    }

    pub fn error(log: impl Into<String>) -> Self {
        Self {
            state: JobState::Error,
            log: Some(log.into()),
            pdf_path: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, JobState::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_roundtrip() {
        let id = JobId::from_raw(0x2a);
        assert_eq!(id.to_string(), "job-0000002a");
        assert_eq!("job-0000002a".parse::<JobId>().unwrap(), id);
        assert!("task-1".parse::<JobId>().is_err());
    }

    #[test]
    fn test_job_ids_increase() {
        let a = JobId::new();
        let b = JobId::new();
        assert!(b > a);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::pending().is_terminal());
        assert!(JobStatus::success("/tmp/main.pdf").is_terminal());
        assert!(JobStatus::error("! Undefined control sequence.").is_terminal());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(JobStatus::pending()).unwrap();
        assert_eq!(json, serde_json::json!({"state": "pending"}));

        let json = serde_json::to_value(JobStatus::error("boom")).unwrap();
        assert_eq!(json["state"], "error");
        assert_eq!(json["log"], "boom");
        assert!(json.get("pdf_path").is_none());
    }
}
