//! Compile job dispatcher.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::{watch, Mutex};
use tokio::task::AbortHandle;
use tracing::info;

use super::backend::{CompileBackend, CompileRequest};
use super::job::{JobId, JobStatus};
use crate::error::CollabError;
use crate::store::ProjectStore;
use crate::Result;

/// Finished jobs kept for status queries before the oldest are evicted.
pub const MAX_RETAINED_JOBS: usize = 1024;

#[derive(Debug)]
struct JobEntry {
    project: String,
    status: Arc<watch::Sender<JobStatus>>,
    task: AbortHandle,
}

#[derive(Debug, Default)]
struct JobTable {
    jobs: HashMap<JobId, JobEntry>,
    /// Newest job per project.
    latest: HashMap<String, JobId>,
    /// Held by the running job of each project's build directory.
    builds: HashMap<String, Arc<Mutex<()>>>,
}

impl JobTable {
    fn evict_finished(&mut self, limit: usize) {
        if self.jobs.len() <= limit {
            return;
        }
        let mut finished: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|(id, entry)| {
                entry.status.borrow().is_terminal()
                    && self.latest.get(&entry.project) != Some(*id)
            })
            .map(|(id, _)| *id)
            .collect();
        finished.sort();
        let excess = self.jobs.len() - limit;
        for id in finished.into_iter().take(excess) {
            self.jobs.remove(&id);
        }
    }
}

/// Accepts compile requests and tracks their status.
///
/// Every submitted job ends in exactly one terminal state. Submitting a new
/// job for a project cancels that project's pending job and marks it as
/// `error` ("superseded"), so a client that polls the project's latest job
/// never sees an older request's result. A new job does not touch the build
/// directory until the cancelled one has been torn down.
pub struct CompileDispatcher {
    store: Arc<dyn ProjectStore>,
    backend: Arc<dyn CompileBackend>,
    table: RwLock<JobTable>,
}

impl CompileDispatcher {
    pub fn new(store: Arc<dyn ProjectStore>, backend: Arc<dyn CompileBackend>) -> Self {
        Self {
            store,
            backend,
            table: RwLock::new(JobTable::default()),
        }
    }

    /// Snapshot the project's files and start compiling them.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, project_id: &str) -> Result<JobId> {
        let project = self
            .store
            .get_project(project_id)?
            .ok_or_else(|| CollabError::ProjectNotFound(project_id.to_string()))?;

        let job_id = JobId::new();
        let request = CompileRequest {
            job_id,
            project_id: project.id.clone(),
            main_file: project.main_file.clone(),
            files: project.files,
        };
        let compile = self.backend.compile(request);
        let (tx, _) = watch::channel(JobStatus::pending());
        let status = Arc::new(tx);

        let mut table = self.table.write().map_err(|_| CollabError::LockPoisoned)?;

        if let Some(previous) = table.latest.insert(project.id.clone(), job_id) {
            if let Some(entry) = table.jobs.get(&previous) {
                let superseded = entry.status.send_if_modified(|s| {
                    if s.is_terminal() {
                        return false;
                    }
                    *s = JobStatus::error(format!("superseded by {}", job_id));
                    true
                });
                if superseded {
                    entry.task.abort();
                    info!(job = %previous, by = %job_id, "compile superseded");
                }
            }
        }

        let build = Arc::clone(
            table
                .builds
                .entry(project.id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        );
        let task_status = Arc::clone(&status);
        let task = tokio::spawn(async move {
            let _build = build.lock_owned().await;
            // Released only after the compile future, and its engine, is dropped.
            let outcome = compile.await;
            task_status.send_if_modified(|s| {
                if s.is_terminal() {
                    return false;
                }
                *s = outcome;
                true
            });
        });

        table.jobs.insert(
            job_id,
            JobEntry {
                project: project.id.clone(),
                status,
                task: task.abort_handle(),
            },
        );
        table.evict_finished(MAX_RETAINED_JOBS);

        info!(job = %job_id, project = %project.id, "compile submitted");
        Ok(job_id)
    }

    /// Current status of a job.
    pub fn status(&self, job_id: JobId) -> Result<JobStatus> {
        let table = self.table.read().map_err(|_| CollabError::LockPoisoned)?;
        table
            .jobs
            .get(&job_id)
            .map(|entry| entry.status.borrow().clone())
            .ok_or_else(|| CollabError::JobNotFound(job_id.to_string()))
    }

    /// Newest job submitted for a project, if any.
    pub fn latest_for_project(&self, project_id: &str) -> Option<JobId> {
        self.table
            .read()
            .ok()
            .and_then(|t| t.latest.get(project_id).copied())
    }

    /// Wait until a job reaches a terminal state.
    pub async fn wait(&self, job_id: JobId) -> Result<JobStatus> {
        let mut rx = {
            let table = self.table.read().map_err(|_| CollabError::LockPoisoned)?;
            table
                .jobs
                .get(&job_id)
                .map(|entry| entry.status.subscribe())
                .ok_or_else(|| CollabError::JobNotFound(job_id.to_string()))?
        };
        let status = rx
            .wait_for(JobStatus::is_terminal)
            .await
            .map_err(|_| CollabError::JobNotFound(job_id.to_string()))?;
        Ok(status.clone())
    }

    /// Number of jobs currently tracked.
    pub fn job_count(&self) -> usize {
        self.table.read().map(|t| t.jobs.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for CompileDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileDispatcher")
            .field("jobs", &self.job_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{CompileFuture, JobState};
    use crate::store::{MemoryProjectStore, Project, DEFAULT_OWNER};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Backend whose jobs finish only when released.
    struct GatedBackend {
        gate: Arc<Notify>,
    }

    impl CompileBackend for GatedBackend {
        fn compile(&self, request: CompileRequest) -> CompileFuture {
            let gate = Arc::clone(&self.gate);
            Box::pin(async move {
                gate.notified().await;
                JobStatus::success(format!("/builds/{}/main.pdf", request.project_id))
            })
        }
    }

    struct FailingBackend;

    impl CompileBackend for FailingBackend {
        fn compile(&self, _request: CompileRequest) -> CompileFuture {
            Box::pin(async { JobStatus::error("! Undefined control sequence.") })
        }
    }

    fn store() -> Arc<MemoryProjectStore> {
        let store = MemoryProjectStore::new();
        store.insert(Project::new("proj1", "Paper", DEFAULT_OWNER)).unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_unknown_project() {
        let dispatcher = CompileDispatcher::new(store(), Arc::new(FailingBackend));
        assert!(matches!(
            dispatcher.submit("nope"),
            Err(CollabError::ProjectNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let dispatcher = CompileDispatcher::new(store(), Arc::new(FailingBackend));
        assert!(matches!(
            dispatcher.status(JobId::from_raw(u64::MAX)),
            Err(CollabError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_is_terminal_error_with_log() {
        let dispatcher = CompileDispatcher::new(store(), Arc::new(FailingBackend));
        let job = dispatcher.submit("proj1").unwrap();

        let status = dispatcher.wait(job).await.unwrap();
        assert_eq!(status.state, JobState::Error);
        assert_eq!(status.log.as_deref(), Some("! Undefined control sequence."));
        assert_eq!(dispatcher.status(job).unwrap(), status);
    }

    #[tokio::test]
    async fn test_pending_until_backend_finishes() {
        let gate = Arc::new(Notify::new());
        let dispatcher = CompileDispatcher::new(
            store(),
            Arc::new(GatedBackend {
                gate: Arc::clone(&gate),
            }),
        );
        let job = dispatcher.submit("proj1").unwrap();
        assert_eq!(dispatcher.status(job).unwrap().state, JobState::Pending);

        gate.notify_one();
        let status = tokio::time::timeout(Duration::from_secs(2), dispatcher.wait(job))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status.state, JobState::Success);
        assert_eq!(status.pdf_path.as_deref(), Some("/builds/proj1/main.pdf"));
    }

    #[tokio::test]
    async fn test_resubmit_supersedes_pending_job() {
        let gate = Arc::new(Notify::new());
        let dispatcher = CompileDispatcher::new(
            store(),
            Arc::new(GatedBackend {
                gate: Arc::clone(&gate),
            }),
        );

        let j1 = dispatcher.submit("proj1").unwrap();
        let j2 = dispatcher.submit("proj1").unwrap();
        assert_eq!(dispatcher.latest_for_project("proj1"), Some(j2));

        let first = dispatcher.status(j1).unwrap();
        assert_eq!(first.state, JobState::Error);
        assert!(first.log.unwrap().contains(&j2.to_string()));
        assert_eq!(dispatcher.status(j2).unwrap().state, JobState::Pending);

        gate.notify_one();
        let second = tokio::time::timeout(Duration::from_secs(2), dispatcher.wait(j2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.state, JobState::Success);

        // The superseded job keeps its own terminal state
        assert_eq!(dispatcher.status(j1).unwrap().state, JobState::Error);
    }

    #[tokio::test]
    async fn test_finished_job_not_overwritten_by_resubmit() {
        let dispatcher = CompileDispatcher::new(store(), Arc::new(FailingBackend));
        let j1 = dispatcher.submit("proj1").unwrap();
        let done = dispatcher.wait(j1).await.unwrap();

        let _j2 = dispatcher.submit("proj1").unwrap();
        assert_eq!(dispatcher.status(j1).unwrap(), done);
    }

    /// Engine script that forks a helper, like latexmk does, and logs to
    /// `engine.log` next to itself.
    #[cfg(unix)]
    fn wrapper_engine(dir: &std::path::Path) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("wrapper-engine");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             log=\"$(dirname \"$0\")/engine.log\"\n\
             ( echo start >> \"$log\"; sleep 1; echo end >> \"$log\" ) &\n\
             wait\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_superseded_engine_stops_before_next_job() {
        use crate::compile::LatexCompiler;

        let dir = tempfile::tempdir().unwrap();
        let engine = wrapper_engine(dir.path());
        let compiler = LatexCompiler::new(dir.path().join("builds"))
            .engine(engine.to_string_lossy())
            .passes(1);
        let dispatcher = CompileDispatcher::new(store(), Arc::new(compiler));

        let j1 = dispatcher.submit("proj1").unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let j2 = dispatcher.submit("proj1").unwrap();

        let second = tokio::time::timeout(Duration::from_secs(10), dispatcher.wait(j2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.state, JobState::Success);
        assert_eq!(dispatcher.status(j1).unwrap().state, JobState::Error);

        // The first helper was killed mid-sleep and never overlapped the second
        let log = std::fs::read_to_string(dir.path().join("engine.log")).unwrap();
        assert_eq!(log, "start\nstart\nend\n");
    }

    #[test]
    fn test_eviction_keeps_latest() {
        let mut table = JobTable::default();
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let _guard = rt.enter();

        for i in 0..5u64 {
            let (tx, _) = watch::channel(JobStatus::error("done"));
            let task = tokio::spawn(async {});
            let id = JobId::from_raw(i);
            table.jobs.insert(
                id,
                JobEntry {
                    project: format!("p{}", i % 2),
                    status: Arc::new(tx),
                    task: task.abort_handle(),
                },
            );
            table.latest.insert(format!("p{}", i % 2), id);
        }

        table.evict_finished(2);
        assert_eq!(table.jobs.len(), 2);
        assert!(table.jobs.contains_key(&JobId::from_raw(3)));
        assert!(table.jobs.contains_key(&JobId::from_raw(4)));
    }
}
