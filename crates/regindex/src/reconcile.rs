//! Removal of stored images whose project no longer exists upstream.

use std::collections::HashSet;

use serde_json::Value;

use crate::collect::progress::{CollectProgress, ProgressCallback, emit};
use crate::store::catalog::documents_in_registry;
use crate::store::{Document, DocumentStore, StoreError};

/// Outcome of one registry sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct SweepReport {
    pub registry: String,
    /// Documents found in the registry.
    pub examined: usize,
    /// Ids of deleted documents.
    pub deleted: Vec<String>,
    /// `(id, error)` for deletes that failed; retried next cycle.
    pub failures: Vec<(String, String)>,
}

impl SweepReport {
    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Owning project id embedded in a stored image.
fn project_id(doc: &Document) -> Option<u64> {
    doc.get("project")
        .and_then(|p| p.get("id"))
        .or_else(|| doc.get("project_id"))
        .and_then(Value::as_u64)
}

/// Delete every document of `registry` whose project is not in
/// `current_project_ids`.
///
/// Documents of other registries are never read or touched. Each delete
/// re-reads the document first so it names the current revision; a failed
/// delete is logged and recorded without stopping the sweep. Only a failing
/// registry query is returned as an error.
pub async fn reconcile<S: DocumentStore + ?Sized>(
    store: &S,
    registry: &str,
    current_project_ids: &HashSet<u64>,
    on_progress: Option<&ProgressCallback>,
) -> Result<SweepReport, StoreError> {
    let documents = documents_in_registry(store, registry).await?;
    let mut report = SweepReport {
        registry: registry.to_string(),
        examined: documents.len(),
        ..SweepReport::default()
    };

    for doc in &documents {
        if project_id(doc).is_some_and(|id| current_project_ids.contains(&id)) {
            continue;
        }
        let Some(id) = doc.id() else {
            continue;
        };

        match delete_current(store, id).await {
            Ok(true) => {
                tracing::info!(id, registry, project_id = ?project_id(doc), "Deleted stale image");
                emit(
                    on_progress,
                    CollectProgress::ImageDeleted {
                        id: id.to_string(),
                        registry: registry.to_string(),
                    },
                );
                report.deleted.push(id.to_string());
            }
            Ok(false) => {
                tracing::debug!(id, "Stale image already gone");
            }
            Err(e) => {
                tracing::warn!(id, registry, error = %e, "Failed to delete stale image");
                report.failures.push((id.to_string(), e.to_string()));
            }
        }
    }

    emit(
        on_progress,
        CollectProgress::SweepComplete {
            registry: registry.to_string(),
            examined: report.examined,
            deleted: report.deleted.len(),
        },
    );

    Ok(report)
}

/// Delete the current revision of `id`. Returns `false` if it vanished.
async fn delete_current<S: DocumentStore + ?Sized>(store: &S, id: &str) -> Result<bool, StoreError> {
    let Some(fresh) = store.get(id).await? else {
        return Ok(false);
    };
    let rev = fresh
        .rev()
        .ok_or_else(|| StoreError::InvalidDocument(format!("{id} has no revision")))?;
    match store.delete(id, rev).await {
        Ok(()) => Ok(true),
        Err(StoreError::NotFound { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}
