//! Diff-gated writes: a record is written only when its content changed.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use super::diff::{DiffPolicy, diff_documents};
use super::{Document, DocumentStore, Result, StoreError, document_id};
use crate::collect::progress::StoreOutcomeKind;

/// What [`store`] did with a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// No document existed under the id.
    Inserted,
    /// The stored document differed; the listed top-level fields changed.
    Updated { changed_fields: BTreeSet<String> },
    /// Nothing material changed, no write happened.
    Unchanged,
}

impl WriteOutcome {
    pub fn is_write(&self) -> bool {
        !matches!(self, WriteOutcome::Unchanged)
    }

    pub fn kind(&self) -> StoreOutcomeKind {
        match self {
            WriteOutcome::Inserted => StoreOutcomeKind::Inserted,
            WriteOutcome::Updated { .. } => StoreOutcomeKind::Updated,
            WriteOutcome::Unchanged => StoreOutcomeKind::Unchanged,
        }
    }
}

/// Result of a diff-gated write.
#[derive(Debug, Clone)]
#[must_use]
pub struct StoredRecord {
    pub id: String,
    pub outcome: WriteOutcome,
    /// The document as it now exists in the store.
    pub document: Document,
}

/// Serialize a record into a document body.
///
/// Timestamps and deltas serialise to canonical strings, so the body can be
/// compared structurally with what the store returns.
pub fn normalize<T: Serialize>(record: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        other => Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Persist `record` under `key` unless the stored copy is already equal.
///
/// The existing document is read right before the write so the update names
/// its current revision. A concurrent writer surfaces as
/// [`StoreError::Conflict`] and is left for the next cycle.
pub async fn store<S, T>(backend: &S, key: &str, record: &T, policy: &DiffPolicy) -> Result<StoredRecord>
where
    S: DocumentStore + ?Sized,
    T: Serialize,
{
    let id = document_id(key);
    let body = normalize(record)?;

    let Some(existing) = backend.get(&id).await? else {
        let document = backend.put(&id, None, body).await?;
        tracing::debug!(id = %id, "Inserted document");
        return Ok(StoredRecord {
            id,
            outcome: WriteOutcome::Inserted,
            document,
        });
    };

    let diff = diff_documents(existing.fields(), &body, policy);
    if diff.is_empty() {
        return Ok(StoredRecord {
            id,
            outcome: WriteOutcome::Unchanged,
            document: existing,
        });
    }

    let changed_fields = diff.affected_root_keys();
    tracing::debug!(id = %id, changed = ?changed_fields, "Updating document");
    let document = backend.put(&id, existing.rev(), body).await?;

    Ok(StoredRecord {
        id,
        outcome: WriteOutcome::Updated { changed_fields },
        document,
    })
}
