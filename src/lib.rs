//! # texcollab
//!
//! Collaborative LaTeX editing backend.
//!
//! Editors connect over WebSocket to a session keyed by project (and
//! optionally file) and exchange whole-document snapshots. The last
//! snapshot wins; nothing is merged. Alongside the relay the crate keeps an
//! in-memory project store and dispatches compile jobs to a LaTeX engine.
//!
//! ## Features
//!
//! - **Session channel**: per-sender FIFO fan-out with bounded queues
//! - **Project store**: trait seam with an in-memory implementation
//! - **Compile jobs**: submit, poll or await, with superseding resubmits
//! - **Bearer tokens**: optional gate on every route except `/health`
//!
//! ## Quick Start
//!
//! ```no_run
//! use texcollab::{SessionKey, SessionRegistry};
//!
//! fn main() -> texcollab::Result<()> {
//!     let registry = SessionRegistry::default();
//!     let key = SessionKey::file("proj1", "main.tex");
//!
//!     let (alice, _alice_inbox) = registry.connect(key.clone())?;
//!     let (_bob, mut bob_inbox) = registry.connect(key)?;
//!
//!     registry.send(&alice, "\\section{Intro}")?;
//!     assert_eq!(bob_inbox.try_recv().flatten().as_deref(), Some("\\section{Intro}"));
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod client;
pub mod compile;
pub mod config;
pub mod error;
pub mod logging;
pub mod security;
pub mod session;
pub mod store;

pub use client::{CollabClient, ConnectionStatus};
pub use compile::{CompileBackend, CompileDispatcher, JobId, JobPoller, JobState, JobStatus};
pub use error::{CollabError, Result};
pub use session::{
    ChannelConfig, KeyMode, OverflowPolicy, ParticipantHandle, ParticipantId, SessionKey,
    SessionRegistry,
};
pub use store::{MemoryProjectStore, Project, ProjectStore};
