//! Progress reporting for collection cycles.
//!
//! Events from the library are turned into structured `tracing` records.

use regindex::collect::{CollectProgress, ProgressCallback, StoreOutcomeKind};

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    /// Wrap the reporter into a callback the collector can call.
    pub fn into_callback(self) -> ProgressCallback {
        Box::new(move |event| self.handle(event))
    }

    pub fn handle(&self, event: CollectProgress) {
        match event {
            CollectProgress::CycleStarted { cycle } => {
                tracing::debug!(cycle, "Cycle started");
            }

            CollectProgress::FetchedPage {
                resource,
                page,
                total_pages,
                count,
            } => {
                tracing::debug!(resource = %resource, page, total_pages, count, "Fetched page");
            }

            CollectProgress::RetryScheduled {
                resource,
                attempt,
                retry_after_ms,
                error,
            } => {
                tracing::debug!(resource = %resource, attempt, retry_after_ms, error = %error, "Retry scheduled");
            }

            CollectProgress::ProjectsListed {
                total,
                registry_enabled,
            } => {
                tracing::debug!(total, registry_enabled, "Projects listed");
            }

            CollectProgress::ImageStored {
                location,
                tags,
                outcome,
            } => match outcome {
                StoreOutcomeKind::Unchanged => {
                    tracing::debug!(location = %location, tags, "Image unchanged");
                }
                StoreOutcomeKind::Inserted | StoreOutcomeKind::Updated => {
                    tracing::info!(location = %location, tags, outcome = outcome.as_str(), "Image stored");
                }
            },

            CollectProgress::ImageSkipped { location, reason } => {
                tracing::debug!(location = %location, reason = %reason, "Image skipped");
            }

            CollectProgress::ItemFailed { error } => {
                tracing::debug!(error = %error, "Item failed");
            }

            CollectProgress::ImageDeleted { id, registry } => {
                tracing::debug!(id = %id, registry = %registry, "Image deleted");
            }

            CollectProgress::SweepComplete {
                registry,
                examined,
                deleted,
            } => {
                tracing::info!(registry = %registry, examined, deleted, "Sweep complete");
            }

            CollectProgress::SweepSkipped { reason } => {
                tracing::debug!(reason = %reason, "Sweep skipped");
            }

            CollectProgress::CycleComplete { .. } => {}

            CollectProgress::Idle { next_cycle_in } => {
                tracing::debug!(next_cycle_in_secs = next_cycle_in.as_secs(), "Idle");
            }

            CollectProgress::ShuttingDown { cycles } => {
                tracing::debug!(cycles, "Shutting down");
            }

            _ => {}
        }
    }
}
