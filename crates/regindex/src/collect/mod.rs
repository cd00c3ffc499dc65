//! Collection cycle and the scheduler that repeats it.
//!
//! One cycle lists every project, collects and enriches the registry images
//! of registry-enabled projects, writes changed records and finally sweeps
//! images whose project disappeared.
//!
//! # Module Structure
//!
//! - [`context`] - Client, store and options shared by every cycle
//! - [`cycle`] - One full pass
//! - [`report`] - Per-cycle counters and item errors
//! - [`scheduler`] - Cycle / idle loop with cooperative shutdown
//! - [`progress`] - Progress events for the caller

pub mod context;
pub mod cycle;
pub mod progress;
pub mod report;
pub mod scheduler;

use thiserror::Error;

use crate::gitlab::GitLabError;
use crate::store::StoreError;

pub use context::{CollectorContext, CollectorOptions, DEFAULT_UPDATE_INTERVAL};
pub use cycle::run_cycle;
pub use progress::{CollectProgress, ProgressCallback, StoreOutcomeKind, emit};
pub use report::{CycleReport, ItemError};
pub use scheduler::{Scheduler, SchedulerState};

/// Errors that end a cycle early.
#[derive(Debug, Error)]
pub enum CollectError {
    /// GitLab rejected the access token. The process should stop.
    #[error("GitLab rejected the access token: {0}")]
    Unauthorized(String),

    /// The project listing failed for good (only with bounded retries).
    #[error("Project listing failed: {0}")]
    Upstream(#[source] GitLabError),

    /// The store could not be prepared.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CollectError {
    /// Whether the scheduler must stop instead of trying again next cycle.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            CollectError::Unauthorized(_) => true,
            CollectError::Upstream(e) => e.is_fatal(),
            CollectError::Store(_) => false,
        }
    }
}

impl From<GitLabError> for CollectError {
    fn from(err: GitLabError) -> Self {
        match err {
            GitLabError::Unauthorized(message) => CollectError::Unauthorized(message),
            other => CollectError::Upstream(other),
        }
    }
}
