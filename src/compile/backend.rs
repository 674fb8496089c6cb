//! Compile backends.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{Output, Stdio};
use std::time::Duration;

use tracing::{debug, info};

use super::job::{JobId, JobStatus};
use crate::error::CollabError;
use crate::store::validate_file_name;
use crate::Result;

/// Default time allowed for one engine pass.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default LaTeX engine.
pub const DEFAULT_ENGINE: &str = "pdflatex";

/// Future resolving to a terminal job status.
pub type CompileFuture = Pin<Box<dyn Future<Output = JobStatus> + Send>>;

/// Snapshot of a project handed to a backend.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub job_id: JobId,
    pub project_id: String,
    pub main_file: String,
    pub files: BTreeMap<String, String>,
}

/// Turns a project snapshot into a terminal job status.
///
/// The returned future may be dropped before completion when a newer job for
/// the same project supersedes it; backends must clean up on drop.
pub trait CompileBackend: Send + Sync {
    fn compile(&self, request: CompileRequest) -> CompileFuture;
}

/// Runs a LaTeX engine in `<builds_dir>/<project_id>/`.
#[derive(Debug, Clone)]
pub struct LatexCompiler {
    builds_dir: PathBuf,
    engine: String,
    timeout: Duration,
    passes: u32,
}

impl LatexCompiler {
    /// Compiler writing into `builds_dir` with `pdflatex`, two passes.
    pub fn new(builds_dir: impl Into<PathBuf>) -> Self {
        Self {
            builds_dir: builds_dir.into(),
            engine: DEFAULT_ENGINE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            passes: 2,
        }
    }

    /// Set the engine binary (e.g. `xelatex`).
    pub fn engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Set the per-pass timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of passes (at least one).
    pub fn passes(mut self, passes: u32) -> Self {
        self.passes = passes.max(1);
        self
    }

    pub fn build_dir(&self, project_id: &str) -> PathBuf {
        self.builds_dir.join(project_id)
    }

    async fn run(self, request: CompileRequest) -> JobStatus {
        let job_id = request.job_id;
        match self.build(request).await {
            Ok(status) => status,
            Err(e) => {
                info!(job = %job_id, error = %e, "compile failed");
                JobStatus::error(e.to_string())
            }
        }
    }

    async fn build(&self, request: CompileRequest) -> Result<JobStatus> {
        validate_file_name(&request.project_id)?;
        validate_file_name(&request.main_file)?;

        let dir = self.build_dir(&request.project_id);
        tokio::fs::create_dir_all(&dir).await?;

        for (name, content) in &request.files {
            validate_file_name(name)?;
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, content).await?;
        }
        debug!(job = %request.job_id, files = request.files.len(), dir = %dir.display(), "sources written");

        // Later passes resolve references; the first pass decides the outcome.
        let first = self.pass(&dir, &request.main_file).await?;
        if !first.status.success() {
            return Ok(JobStatus::error(
                String::from_utf8_lossy(&first.stdout).into_owned(),
            ));
        }
        for _ in 1..self.passes {
            self.pass(&dir, &request.main_file).await?;
        }

        let pdf_path = dir.join(Path::new(&request.main_file).with_extension("pdf"));
        let main_pdf = dir.join("main.pdf");
        if pdf_path != main_pdf && tokio::fs::try_exists(&pdf_path).await.unwrap_or(false) {
            tokio::fs::copy(&pdf_path, &main_pdf).await?;
        }

        info!(job = %request.job_id, project = %request.project_id, "compile succeeded");
        Ok(JobStatus::success(main_pdf.to_string_lossy()))
    }

    async fn pass(&self, dir: &Path, main_file: &str) -> Result<Output> {
        let mut command = std::process::Command::new(&self.engine);
        command
            .arg("-interaction=nonstopmode")
            .arg(main_file)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Helpers forked by wrapper engines share the group and die with it.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let mut command = tokio::process::Command::from(command);
        command.kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| CollabError::Compile(format!("failed to run {}: {}", self.engine, e)))?;
        let group = ProcessGroup::new(child.id());

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                CollabError::Compile(format!(
                    "{} timed out after {}s",
                    self.engine,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| CollabError::Compile(format!("failed to run {}: {}", self.engine, e)))?;

        group.disarm();
        Ok(output)
    }
}

/// Kills the engine's process group when dropped.
///
/// Dropped armed when a pass times out or its job is cancelled.
#[derive(Debug)]
struct ProcessGroup {
    id: Option<u32>,
}

impl ProcessGroup {
    fn new(id: Option<u32>) -> Self {
        Self { id }
    }

    fn disarm(mut self) {
        self.id = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        let Some(id) = self.id else {
            return;
        };
        #[cfg(unix)]
        {
            // A group id is not reused while any member is alive or unreaped.
            // SAFETY: killpg takes plain integers and touches no memory.
            let rc = unsafe { libc::killpg(id as libc::pid_t, libc::SIGKILL) };
            if rc == 0 {
                debug!(pgid = id, "engine process group killed");
            }
        }
        #[cfg(not(unix))]
        let _ = id;
    }
}

impl CompileBackend for LatexCompiler {
    fn compile(&self, request: CompileRequest) -> CompileFuture {
        let compiler = self.clone();
        Box::pin(async move { compiler.run(request).await })
    }
}
