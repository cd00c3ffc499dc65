//! regindex - mirror GitLab container registry metadata into a document store.
//!
//! Every cycle lists the projects visible to a token, collects the registry
//! images of projects with the container registry enabled, enriches them with
//! derived fields (sizes, ages, revision groups, README) and writes a record
//! only when it differs from the stored one. Records whose project vanished
//! are swept afterwards.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use regindex::{CollectorContext, CollectorOptions, CouchStore, GitLabClient, Scheduler};
//!
//! let client = GitLabClient::new("https://gitlab.example.com", &token, true, DEFAULT_TIMEOUT)?;
//! let store = CouchStore::new("http://localhost:5984", "container_images", None, DEFAULT_TIMEOUT)?;
//! let context = CollectorContext::new(client, Arc::new(store), CollectorOptions::default());
//!
//! let (_tx, rx) = tokio::sync::watch::channel(false);
//! Scheduler::new(context, rx).run(None).await?;
//! ```

pub mod collect;
pub mod gitlab;
pub mod http;
pub mod image;
pub mod reconcile;
pub mod retry;
pub mod store;

pub use collect::{
    CollectError, CollectProgress, CollectorContext, CollectorOptions, CycleReport, ItemError,
    ProgressCallback, Scheduler, SchedulerState, run_cycle,
};
pub use gitlab::{GitLabClient, GitLabError};
pub use image::{ContainerImage, Project, Tag};
pub use reconcile::{SweepReport, reconcile};
pub use retry::RetryConfig;
pub use store::{CouchStore, DiffPolicy, DocumentStore, MemoryStore, StoreError, WriteOutcome};
