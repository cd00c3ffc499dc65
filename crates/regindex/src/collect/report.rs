//! Per-cycle counters and the item errors collected along the way.

use std::time::Duration;

use thiserror::Error;

use crate::store::WriteOutcome;

/// A single item that could not be processed. The cycle continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("malformed project payload: {error}")]
    MalformedProject { payload: String, error: String },

    #[error("listing repositories of project {project_id} failed: {error}")]
    RepositoryListing {
        project_id: u64,
        payload: String,
        error: String,
    },

    #[error("malformed repository payload in project {project_id}: {error}")]
    MalformedRepository {
        project_id: u64,
        payload: String,
        error: String,
    },

    #[error("fetching tag {tag} of {location} failed: {error}")]
    TagDetail {
        location: String,
        tag: String,
        payload: String,
        error: String,
    },

    #[error("fetching README of project {project_id} failed: {error}")]
    Readme { project_id: u64, error: String },

    #[error("storing {location} failed: {error}")]
    Store { location: String, error: String },

    #[error("sweeping registry {registry} failed: {error}")]
    Sweep { registry: String, error: String },

    #[error("deleting {id} failed: {error}")]
    Delete { id: String, error: String },
}

impl ItemError {
    /// Upstream payload that caused the failure, if one was kept.
    pub fn payload(&self) -> Option<&str> {
        match self {
            ItemError::MalformedProject { payload, .. }
            | ItemError::RepositoryListing { payload, .. }
            | ItemError::MalformedRepository { payload, .. }
            | ItemError::TagDetail { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

/// Summary of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct CycleReport {
    pub cycle: u64,
    /// Projects returned by the listing.
    pub projects: usize,
    /// Of those, projects with the container registry enabled.
    pub registry_projects: usize,
    /// Repositories returned by the registry listings.
    pub images_seen: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Images dropped because they had no tags.
    pub skipped_untagged: usize,
    /// Documents removed by the sweep.
    pub deleted: usize,
    pub swept_registries: Vec<String>,
    /// Set when the sweep did not run (empty project listing).
    pub sweep_skipped: bool,
    pub errors: Vec<ItemError>,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn new(cycle: u64) -> Self {
        Self {
            cycle,
            ..Self::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.errors.len()
    }

    /// Images that went through the diff-gated write.
    pub fn stored(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }

    pub fn record_outcome(&mut self, outcome: &WriteOutcome) {
        match outcome {
            WriteOutcome::Inserted => self.inserted += 1,
            WriteOutcome::Updated { .. } => self.updated += 1,
            WriteOutcome::Unchanged => self.unchanged += 1,
        }
    }
}
