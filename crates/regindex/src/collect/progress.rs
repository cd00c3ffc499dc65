//! Progress events emitted while a collection cycle runs.
//!
//! The library never decides how events are shown; the binary installs a
//! callback that turns them into log records.

use std::time::Duration;

/// Progress events emitted during a collection cycle.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum CollectProgress {
    /// A new cycle is starting.
    CycleStarted {
        /// 1-indexed cycle number within this process.
        cycle: u64,
    },

    /// Fetched one page of a paginated upstream resource.
    FetchedPage {
        /// Resource path, e.g. `/projects`.
        resource: String,
        /// Page number (1-indexed).
        page: u32,
        /// Total pages as reported by the first response.
        total_pages: u32,
        /// Number of items on this page.
        count: usize,
    },

    /// A request failed and will be retried after a fixed delay.
    RetryScheduled {
        /// What was being fetched.
        resource: String,
        /// Attempt that just failed (1-indexed).
        attempt: u32,
        /// Delay before the next attempt.
        retry_after_ms: u64,
        /// Short error message.
        error: String,
    },

    /// The project listing is complete.
    ProjectsListed {
        /// Every project returned upstream.
        total: usize,
        /// Projects with the container registry enabled.
        registry_enabled: usize,
    },

    /// An image record went through the diff-gated write.
    ImageStored {
        /// Image location (identity).
        location: String,
        /// Number of tags on the record.
        tags: usize,
        /// Whether a physical write happened.
        outcome: StoreOutcomeKind,
    },

    /// An image was left out of this cycle.
    ImageSkipped {
        /// Image location (identity).
        location: String,
        /// Why it was skipped.
        reason: String,
    },

    /// A single item failed; the cycle continues.
    ItemFailed {
        /// Rendered item error.
        error: String,
    },

    /// A stale document was removed by the sweep.
    ImageDeleted {
        /// Document id.
        id: String,
        /// Registry the document belonged to.
        registry: String,
    },

    /// The sweep over one registry finished.
    SweepComplete {
        /// Registry swept.
        registry: String,
        /// Documents examined.
        examined: usize,
        /// Documents deleted.
        deleted: usize,
    },

    /// The sweep was skipped for this cycle.
    SweepSkipped {
        /// Why the sweep did not run.
        reason: String,
    },

    /// A cycle finished.
    CycleComplete {
        /// Cycle number.
        cycle: u64,
        /// Images inserted.
        inserted: usize,
        /// Images updated.
        updated: usize,
        /// Images left untouched because nothing changed.
        unchanged: usize,
        /// Documents deleted by the sweep.
        deleted: usize,
        /// Item errors collected during the cycle.
        errors: usize,
        /// Wall-clock duration of the cycle.
        elapsed: Duration,
    },

    /// The scheduler is idle until the next cycle.
    Idle {
        /// Time until the next cycle.
        next_cycle_in: Duration,
    },

    /// Shutdown was observed at a cycle boundary.
    ShuttingDown {
        /// Completed cycles.
        cycles: u64,
    },
}

/// Kind of write performed for an image, without the stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcomeKind {
    Inserted,
    Updated,
    Unchanged,
}

impl StoreOutcomeKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StoreOutcomeKind::Inserted => "inserted",
            StoreOutcomeKind::Updated => "updated",
            StoreOutcomeKind::Unchanged => "unchanged",
        }
    }
}

/// Callback type for progress reporting.
pub type ProgressCallback = Box<dyn Fn(CollectProgress) + Send + Sync>;

#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: CollectProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
