//! Bounded status polling.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use super::dispatcher::CompileDispatcher;
use super::job::{JobId, JobStatus};
use crate::error::CollabError;

/// Default delay between two status requests.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of status requests before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 120;

/// Why polling ended without a terminal state.
#[derive(Error, Debug)]
pub enum PollError {
    /// Every attempt saw a pending job.
    #[error("job still pending after {attempts} attempts")]
    Exhausted { attempts: u32 },

    /// Fetching the status failed.
    #[error(transparent)]
    Status(#[from] CollabError),
}

/// Polls a job at a fixed interval until it is terminal.
///
/// Stops on the first terminal status and never makes more than
/// `max_attempts` requests. Errors from the status source end polling
/// immediately; there is no retry.
#[derive(Debug, Clone, Copy)]
pub struct JobPoller {
    interval: Duration,
    max_attempts: u32,
}

impl JobPoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Poll any status source.
    pub async fn until_terminal<F, Fut>(&self, mut fetch: F) -> Result<JobStatus, PollError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = crate::Result<JobStatus>>,
    {
        for attempt in 1..=self.max_attempts {
            let status = fetch().await?;
            if status.is_terminal() {
                return Ok(status);
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }
        Err(PollError::Exhausted {
            attempts: self.max_attempts,
        })
    }

    /// Poll a job tracked by an in-process dispatcher.
    pub async fn poll_job(
        &self,
        dispatcher: &CompileDispatcher,
        job_id: JobId,
    ) -> Result<JobStatus, PollError> {
        self.until_terminal(|| async move { dispatcher.status(job_id) })
            .await
    }
}

impl Default for JobPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::JobState;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_stops_on_terminal() {
        let calls = Cell::new(0);
        let poller = JobPoller::new(Duration::from_millis(1), 10);

        let status = poller
            .until_terminal(|| {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    Ok(if n < 3 {
                        JobStatus::pending()
                    } else {
                        JobStatus::success("/tmp/main.pdf")
                    })
                }
            })
            .await
            .unwrap();

        assert_eq!(status.state, JobState::Success);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_bounded_attempts() {
        let calls = Cell::new(0);
        let poller = JobPoller::new(Duration::from_millis(1), 4);

        let err = poller
            .until_terminal(|| {
                calls.set(calls.get() + 1);
                async { Ok(JobStatus::pending()) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::Exhausted { attempts: 4 }));
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test]
    async fn test_source_error_is_not_retried() {
        let calls = Cell::new(0);
        let poller = JobPoller::new(Duration::from_millis(1), 10);

        let err = poller
            .until_terminal(|| {
                calls.set(calls.get() + 1);
                async { Err(CollabError::JobNotFound("job-00000001".into())) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PollError::Status(CollabError::JobNotFound(_))));
        assert_eq!(calls.get(), 1);
    }
}
