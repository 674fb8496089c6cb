//! Compile job dispatch.
//!
//! `CompileDispatcher::submit` snapshots a project and hands it to a
//! [`CompileBackend`]; `status` reports `pending`, `success` or `error` for a
//! job ID. Clients either poll with [`JobPoller`] or await
//! `CompileDispatcher::wait`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use texcollab::compile::{CompileDispatcher, JobPoller, LatexCompiler};
//! use texcollab::store::{MemoryProjectStore, ProjectStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryProjectStore::new());
//! let project = store.create_project("Thesis", "user1")?;
//!
//! let dispatcher = CompileDispatcher::new(store, Arc::new(LatexCompiler::new("builds")));
//! let job = dispatcher.submit(&project.id)?;
//! let status = JobPoller::default().poll_job(&dispatcher, job).await?;
//! println!("{:?}", status.state);
//! # Ok(())
//! # }
//! ```

mod backend;
mod dispatcher;
mod job;
mod poll;

pub use backend::{
    CompileBackend, CompileFuture, CompileRequest, LatexCompiler, DEFAULT_ENGINE, DEFAULT_TIMEOUT,
};
pub use dispatcher::{CompileDispatcher, MAX_RETAINED_JOBS};
pub use job::{JobId, JobState, JobStatus};
pub use poll::{JobPoller, PollError, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};
